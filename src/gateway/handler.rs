use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::embedding::EmbeddingProvider;
use crate::generation::GenerationProvider;
use crate::history::{
    CHAT_MSG, ChatRepository, ChatService, ChatSession, Envelope, HISTORY_MSG, HistoryEntry,
};
use crate::vectordb::SimilarityStore;

use super::error::GatewayError;
use super::state::HandlerState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    /// Continue an existing chat; a new chat id is issued when absent.
    #[serde(default)]
    pub chat_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: String,
    pub chat_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub stream_id: String,
    pub cancelled: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    pub id: Option<String>,
}

/// Trimmed question, or `InvalidRequest` when blank.
pub(crate) fn validated_question(request: &QueryRequest) -> Result<&str, GatewayError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(GatewayError::InvalidRequest("Invalid question".to_string()));
    }
    Ok(question)
}

/// Chat id for this exchange and whether it starts a new chat.
pub(crate) async fn resolve_chat_id<R: ChatRepository>(
    chats: &ChatService<R>,
    requested: Option<u64>,
) -> Result<(u64, bool), GatewayError> {
    match requested {
        Some(chat_id) => Ok((chat_id, false)),
        None => Ok((chats.next_chat_id().await?, true)),
    }
}

#[instrument(skip(state, request), fields(chat_id = tracing::field::Empty))]
pub async fn query_handler<E, S, G, R>(
    State(state): State<HandlerState<E, S, G, R>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, GatewayError>
where
    E: EmbeddingProvider + 'static,
    S: SimilarityStore + 'static,
    G: GenerationProvider + 'static,
    R: ChatRepository + 'static,
{
    let question = validated_question(&request)?;
    let prompt = state.pipeline.build_prompt(question).await?;

    let (chat_id, is_new_chat) = resolve_chat_id(&state.chats, request.chat_id).await?;
    tracing::Span::current().record("chat_id", chat_id);

    let raw = state.generator.generate(&prompt).await?;
    let turn = state
        .chats
        .record_exchange(chat_id, question, &raw, is_new_chat)
        .await?;

    info!(chat_id, is_new_chat, response_len = turn.response.len(), "Answered query");
    Ok(Json(QueryResponse {
        response: turn.response,
        chat_id,
    }))
}

#[instrument(skip(state))]
pub async fn cancel_stream_handler<E, S, G, R>(
    State(state): State<HandlerState<E, S, G, R>>,
    Path(stream_id): Path<String>,
) -> Result<Json<CancelResponse>, GatewayError>
where
    E: EmbeddingProvider + 'static,
    S: SimilarityStore + 'static,
    G: GenerationProvider + 'static,
    R: ChatRepository + 'static,
{
    let id = Uuid::parse_str(&stream_id)
        .map_err(|_| GatewayError::InvalidRequest(format!("Invalid stream id '{}'", stream_id)))?;

    if !state.streams.cancel(&id) {
        return Err(GatewayError::NotFound(format!("No live stream '{}'", stream_id)));
    }

    Ok(Json(CancelResponse {
        stream_id,
        cancelled: true,
    }))
}

#[instrument(skip(state))]
pub async fn history_handler<E, S, G, R>(
    State(state): State<HandlerState<E, S, G, R>>,
) -> Result<Json<Envelope<Vec<HistoryEntry>>>, GatewayError>
where
    E: EmbeddingProvider + 'static,
    S: SimilarityStore + 'static,
    G: GenerationProvider + 'static,
    R: ChatRepository + 'static,
{
    let entries = state.chats.history().await?;
    debug!(entries = entries.len(), "Serving history");
    Ok(Json(Envelope::ok(HISTORY_MSG, entries)))
}

#[instrument(skip(state, query))]
pub async fn chat_details_handler<E, S, G, R>(
    State(state): State<HandlerState<E, S, G, R>>,
    Query(query): Query<ChatQuery>,
) -> Result<Json<Envelope<ChatSession>>, GatewayError>
where
    E: EmbeddingProvider + 'static,
    S: SimilarityStore + 'static,
    G: GenerationProvider + 'static,
    R: ChatRepository + 'static,
{
    let chat_id: u64 = query
        .id
        .as_deref()
        .and_then(|id| id.trim().parse().ok())
        .ok_or_else(|| {
            GatewayError::InvalidRequest("Invalid or missing 'id' query parameter".to_string())
        })?;

    let session = state
        .chats
        .chat(chat_id)
        .await?
        .ok_or_else(|| GatewayError::NotFound("Chat not found".to_string()))?;

    Ok(Json(Envelope::ok(CHAT_MSG, session)))
}
