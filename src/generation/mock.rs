use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use parking_lot::RwLock;

use super::error::GenerationError;
use super::provider::GenerationProvider;
use super::stream::GenerationStream;

/// Scripted generator that replays fixed chunks.
#[derive(Debug)]
pub struct MockGenerator {
    chunks: Vec<String>,
    chunk_delay: Option<Duration>,
    fail_at_start: RwLock<bool>,
    fail_after: Option<usize>,
    hang: bool,
    deadline: Duration,
    calls: AtomicUsize,
    prompts: RwLock<Vec<String>>,
}

impl MockGenerator {
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            chunk_delay: None,
            fail_at_start: RwLock::new(false),
            fail_after: None,
            hang: false,
            deadline: Duration::from_secs(30),
            calls: AtomicUsize::new(0),
            prompts: RwLock::new(Vec::new()),
        }
    }

    /// Sleeps before every chunk.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Emits an upstream error after `n` chunks.
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Never ends after the scripted chunks (until the deadline or cancellation).
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn set_fail_at_start(&self, fail: bool) {
        *self.fail_at_start.write() = fail;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.read().clone()
    }
}

impl GenerationProvider for MockGenerator {
    async fn generate_stream(&self, prompt: &str) -> Result<GenerationStream, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.write().push(prompt.to_string());

        if *self.fail_at_start.read() {
            return Err(GenerationError::RequestFailed {
                reason: "connection refused".to_string(),
            });
        }

        let mut items: Vec<Result<String, GenerationError>> =
            self.chunks.iter().cloned().map(Ok).collect();
        if let Some(n) = self.fail_after {
            items.truncate(n);
            items.push(Err(GenerationError::Upstream {
                reason: "mock upstream failure".to_string(),
            }));
        }

        let delay = self.chunk_delay;
        let scripted = stream::iter(items).then(move |item| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            item
        });

        let upstream = if self.hang {
            scripted.chain(stream::pending()).boxed()
        } else {
            scripted.boxed()
        };

        Ok(GenerationStream::spawn(upstream, self.deadline))
    }
}
