//! Server-sent event stream for `POST /query/stream`.
//!
//! Event sequence: one `start` (`{chat_id, stream_id}`), zero or more `chunk`
//! (`{chat_id, stream_id, chunk}`), then exactly one of `end` (`{chat_id, stream_id}`) or
//! `error` (`{chat_id, stream_id, error, kind}`). Reasoning spans are filtered out of the
//! chunks as they arrive; the exchange is recorded before `end` is sent.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::{self, Stream};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::embedding::EmbeddingProvider;
use crate::generation::{
    GenerationError, GenerationProvider, GenerationStream, StreamEvent, StreamRegistry,
    ThinkFilter,
};
use crate::history::{ChatRepository, ChatService};
use crate::vectordb::SimilarityStore;

use super::error::GatewayError;
use super::handler::{QueryRequest, resolve_chat_id, validated_question};
use super::state::HandlerState;

#[derive(Debug, Clone, Serialize)]
pub struct StreamStart {
    pub chat_id: u64,
    pub stream_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamChunk {
    pub chat_id: u64,
    pub stream_id: String,
    pub chunk: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamEnd {
    pub chat_id: u64,
    pub stream_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamFailure {
    pub chat_id: u64,
    pub stream_id: String,
    pub error: String,
    pub kind: &'static str,
}

#[instrument(skip(state, request), fields(chat_id = tracing::field::Empty))]
pub async fn query_stream_handler<E, S, G, R>(
    State(state): State<HandlerState<E, S, G, R>>,
    Json(request): Json<QueryRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static>, GatewayError>
where
    E: EmbeddingProvider + 'static,
    S: SimilarityStore + 'static,
    G: GenerationProvider + 'static,
    R: ChatRepository + 'static,
{
    let question = validated_question(&request)?.to_string();
    let prompt = state.pipeline.build_prompt(&question).await?;

    let (chat_id, is_new_chat) = resolve_chat_id(&state.chats, request.chat_id).await?;
    tracing::Span::current().record("chat_id", chat_id);

    let generation = state.generator.generate_stream(&prompt).await?;
    let stream_id = state.streams.register(&generation);
    info!(chat_id, stream_id = %stream_id, "Streaming answer");

    let session = SseSession::new(
        generation,
        Registration {
            registry: state.streams.clone(),
            id: stream_id,
        },
        Arc::clone(&state.chats),
        chat_id,
        question,
        is_new_chat,
    );

    let events = stream::unfold(session, |mut session| async move {
        loop {
            if let Some(event) = session.pending.pop_front() {
                return Some((Ok(event), session));
            }
            if session.finished {
                return None;
            }
            session.advance().await;
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Removes the stream from the registry however the response ends (including disconnect).
struct Registration {
    registry: StreamRegistry,
    id: Uuid,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}

struct SseSession<R> {
    generation: GenerationStream,
    registration: Registration,
    chats: Arc<ChatService<R>>,
    filter: ThinkFilter,
    raw: String,
    chat_id: u64,
    stream_id: String,
    question: String,
    is_new_chat: bool,
    pending: VecDeque<Event>,
    finished: bool,
}

impl<R: ChatRepository> SseSession<R> {
    fn new(
        generation: GenerationStream,
        registration: Registration,
        chats: Arc<ChatService<R>>,
        chat_id: u64,
        question: String,
        is_new_chat: bool,
    ) -> Self {
        let stream_id = registration.id.to_string();
        let mut pending = VecDeque::new();
        pending.push_back(json_event(
            "start",
            &StreamStart {
                chat_id,
                stream_id: stream_id.clone(),
            },
        ));

        Self {
            generation,
            registration,
            chats,
            filter: ThinkFilter::new(),
            raw: String::new(),
            chat_id,
            stream_id,
            question,
            is_new_chat,
            pending,
            finished: false,
        }
    }

    /// Pulls one upstream event and queues the resulting SSE events.
    async fn advance(&mut self) {
        match self.generation.next_event().await {
            Some(StreamEvent::Chunk(chunk)) => {
                self.raw.push_str(&chunk);
                let visible = self.filter.push(&chunk);
                self.queue_chunk(visible);
            }
            Some(StreamEvent::Done) => {
                let tail = self.filter.finish();
                self.queue_chunk(tail);
                self.complete().await;
            }
            Some(StreamEvent::Error(e)) => self.fail(e),
            None => self.finished = true,
        }
    }

    fn queue_chunk(&mut self, chunk: String) {
        if chunk.is_empty() {
            return;
        }
        self.pending.push_back(json_event(
            "chunk",
            &StreamChunk {
                chat_id: self.chat_id,
                stream_id: self.stream_id.clone(),
                chunk,
            },
        ));
    }

    async fn complete(&mut self) {
        self.finished = true;
        self.registration.registry.remove(&self.registration.id);

        match self
            .chats
            .record_exchange(self.chat_id, &self.question, &self.raw, self.is_new_chat)
            .await
        {
            Ok(_) => {
                info!(chat_id = self.chat_id, stream_id = %self.stream_id, "Stream complete");
                self.pending.push_back(json_event(
                    "end",
                    &StreamEnd {
                        chat_id: self.chat_id,
                        stream_id: self.stream_id.clone(),
                    },
                ));
            }
            Err(e) => {
                error!(chat_id = self.chat_id, error = %e, "Failed to record streamed exchange");
                self.pending.push_back(self.failure_event(e.to_string(), "history_error"));
            }
        }
    }

    fn fail(&mut self, err: GenerationError) {
        self.finished = true;
        let kind = match err {
            GenerationError::Cancelled => {
                warn!(stream_id = %self.stream_id, "Stream cancelled before completion");
                "cancelled"
            }
            GenerationError::Timeout { .. } => "timeout",
            _ => {
                error!(stream_id = %self.stream_id, error = %err, "Stream interrupted");
                "provider_unavailable"
            }
        };
        self.pending.push_back(self.failure_event(err.to_string(), kind));
    }

    fn failure_event(&self, error: String, kind: &'static str) -> Event {
        json_event(
            "error",
            &StreamFailure {
                chat_id: self.chat_id,
                stream_id: self.stream_id.clone(),
                error,
                kind,
            },
        )
    }
}

fn json_event<T: Serialize>(name: &'static str, payload: &T) -> Event {
    match serde_json::to_string(payload) {
        Ok(json) => Event::default().event(name).data(json),
        Err(e) => {
            error!("Failed to serialize {} event: {}", name, e);
            Event::default().event("error").data("serialization failed")
        }
    }
}
