//! Cancellable stream of generated text.
//!
//! A producer task drains the upstream provider stream and forwards
//! [`StreamEvent`]s over a bounded channel. Dropping or cancelling the
//! [`GenerationStream`] aborts the producer, which drops the upstream network call.

use std::collections::HashMap;
use std::pin::{Pin, pin};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::stream::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::GenerationError;

const CHANNEL_CAPACITY: usize = 64;

/// One item of a generation stream. `Done` and `Error` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(String),
    Done,
    Error(GenerationError),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Chunk(_))
    }
}

pub struct GenerationStream {
    rx: mpsc::Receiver<StreamEvent>,
    abort: AbortHandle,
    terminated: bool,
}

impl std::fmt::Debug for GenerationStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationStream")
            .field("terminated", &self.terminated)
            .field("producer_finished", &self.abort.is_finished())
            .finish()
    }
}

impl GenerationStream {
    /// Spawns a producer forwarding `upstream` until it ends, fails, or `deadline`
    /// elapses (measured from now).
    pub fn spawn<S>(upstream: S, deadline: Duration) -> Self
    where
        S: Stream<Item = Result<String, GenerationError>> + Send + 'static,
    {
        Self::spawn_until(upstream, Instant::now() + deadline, deadline)
    }

    /// Like [`spawn`](Self::spawn), but against an absolute `expires_at` taken before the
    /// upstream was opened. `budget` is the total allowance reported on timeout.
    pub fn spawn_until<S>(upstream: S, expires_at: Instant, budget: Duration) -> Self
    where
        S: Stream<Item = Result<String, GenerationError>> + Send + 'static,
    {
        Self::start(upstream, Some((expires_at, budget)))
    }

    /// Builds a stream from fixed events; used by providers that already hold the output.
    /// No deadline applies.
    pub fn from_events(events: Vec<StreamEvent>) -> Self {
        let items: Vec<Result<String, GenerationError>> = events
            .into_iter()
            .filter_map(|event| match event {
                StreamEvent::Chunk(c) => Some(Ok(c)),
                StreamEvent::Error(e) => Some(Err(e)),
                StreamEvent::Done => None,
            })
            .collect();
        Self::start(futures_util::stream::iter(items), None)
    }

    fn start<S>(upstream: S, deadline: Option<(Instant, Duration)>) -> Self
    where
        S: Stream<Item = Result<String, GenerationError>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        let task = tokio::spawn(async move {
            let mut upstream = pin!(upstream);
            loop {
                let next = match deadline {
                    Some((expires_at, budget)) => {
                        match tokio::time::timeout_at(expires_at, upstream.next()).await {
                            Ok(next) => next,
                            Err(_) => Some(Err(GenerationError::Timeout { after: budget })),
                        }
                    }
                    None => upstream.next().await,
                };
                let event = match next {
                    Some(Ok(chunk)) => StreamEvent::Chunk(chunk),
                    Some(Err(e)) => StreamEvent::Error(e),
                    None => StreamEvent::Done,
                };

                let terminal = event.is_terminal();
                if tx.send(event).await.is_err() {
                    debug!("Generation stream consumer went away");
                    return;
                }
                if terminal {
                    return;
                }
            }
        });

        Self {
            rx,
            abort: task.abort_handle(),
            terminated: false,
        }
    }

    /// Next event, or `None` once a terminal event has been delivered.
    ///
    /// If the producer disappears without a terminal event (it was cancelled), a single
    /// `Error(Cancelled)` is reported.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        if self.terminated {
            return None;
        }
        let event = self
            .rx
            .recv()
            .await
            .unwrap_or(StreamEvent::Error(GenerationError::Cancelled));
        self.terminated = event.is_terminal();
        Some(event)
    }

    /// Aborts the producer and the upstream call.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Concatenates all chunks, failing on a terminal error.
    pub async fn collect_text(mut self) -> Result<String, GenerationError> {
        let mut text = String::new();
        while let Some(event) = self.next_event().await {
            match event {
                StreamEvent::Chunk(chunk) => text.push_str(&chunk),
                StreamEvent::Done => return Ok(text),
                StreamEvent::Error(e) => return Err(e),
            }
        }
        Err(GenerationError::Cancelled)
    }
}

impl Stream for GenerationStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.terminated {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(event) => {
                let event = event.unwrap_or(StreamEvent::Error(GenerationError::Cancelled));
                self.terminated = event.is_terminal();
                Poll::Ready(Some(event))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for GenerationStream {
    fn drop(&mut self) {
        self.abort.abort();
    }
}

/// Live streams keyed by per-connection id.
///
/// Cancelling one id aborts only that stream's producer.
#[derive(Debug, Clone, Default)]
pub struct StreamRegistry {
    streams: Arc<Mutex<HashMap<Uuid, AbortHandle>>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `stream` and returns its id.
    pub fn register(&self, stream: &GenerationStream) -> Uuid {
        let id = Uuid::new_v4();
        self.streams.lock().insert(id, stream.abort_handle());
        debug!(stream_id = %id, "Registered generation stream");
        id
    }

    /// Cancels the stream with `id`. Returns `false` if it is unknown or already finished.
    pub fn cancel(&self, id: &Uuid) -> bool {
        match self.streams.lock().remove(id) {
            Some(handle) => {
                let was_running = !handle.is_finished();
                handle.abort();
                if was_running {
                    warn!(stream_id = %id, "Generation stream cancelled");
                }
                was_running
            }
            None => false,
        }
    }

    /// Forgets `id` without cancelling it.
    pub fn remove(&self, id: &Uuid) {
        self.streams.lock().remove(id);
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.streams.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.streams.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
