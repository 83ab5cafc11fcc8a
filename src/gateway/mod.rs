//! HTTP gateway (Axum) for retrieval-grounded answers and chat history.
//!
//! This module is primarily used by the `vulnrag` server binary.

pub mod error;
pub mod handler;
pub mod state;
pub mod streaming;


use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use error::GatewayError;
pub use handler::{
    cancel_stream_handler, chat_details_handler, history_handler, query_handler,
};
pub use state::HandlerState;
pub use streaming::query_stream_handler;

use crate::embedding::EmbeddingProvider;
use crate::generation::GenerationProvider;
use crate::history::ChatRepository;
use crate::vectordb::SimilarityStore;

pub const VULNRAG_STATUS_HEADER: &str = "x-vulnrag-status";
pub const STATUS_HEALTHY: &str = "healthy";
pub const STATUS_READY: &str = "ready";
pub const STATUS_ERROR: &str = "error";

pub fn create_router_with_state<E, S, G, R>(state: HandlerState<E, S, G, R>) -> Router
where
    E: EmbeddingProvider + 'static,
    S: SimilarityStore + 'static,
    G: GenerationProvider + 'static,
    R: ChatRepository + 'static,
{
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler::<E, S, G, R>))
        .route("/query", post(query_handler::<E, S, G, R>))
        .route("/query/stream", post(query_stream_handler::<E, S, G, R>))
        .route(
            "/query/stream/{stream_id}",
            delete(cancel_stream_handler::<E, S, G, R>),
        )
        .route("/history", get(history_handler::<E, S, G, R>))
        .route("/history/details", get(chat_details_handler::<E, S, G, R>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy: any origin, or an explicit allow-list with credentials.
pub fn cors_layer(allow_any: bool, origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if allow_any {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(serde::Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub components: ComponentStatus,
}

#[derive(serde::Serialize)]
pub struct ComponentStatus {
    pub http: &'static str,
    pub vectordb: &'static str,
    pub history: &'static str,
}

#[tracing::instrument]
pub async fn health_handler() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        VULNRAG_STATUS_HEADER,
        HeaderValue::from_static(STATUS_HEALTHY),
    );

    (
        StatusCode::OK,
        headers,
        Json(HealthResponse { status: "ok" }),
    )
        .into_response()
}

#[tracing::instrument(skip(state))]
pub async fn ready_handler<E, S, G, R>(State(state): State<HandlerState<E, S, G, R>>) -> Response
where
    E: EmbeddingProvider + 'static,
    S: SimilarityStore + 'static,
    G: GenerationProvider + 'static,
    R: ChatRepository + 'static,
{
    let vectordb_status = match state.pipeline.store().health_check().await {
        Ok(()) => STATUS_READY,
        Err(e) => {
            warn!(error = %e, "Similarity store not reachable");
            STATUS_ERROR
        }
    };

    let history_status = match state.chats.history().await {
        Ok(_) => STATUS_READY,
        Err(e) => {
            warn!(error = %e, "History storage not readable");
            STATUS_ERROR
        }
    };

    let components = ComponentStatus {
        http: STATUS_READY,
        vectordb: vectordb_status,
        history: history_status,
    };

    let is_ready = components.vectordb == STATUS_READY && components.history == STATUS_READY;

    let status_code = if is_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let status_msg = if is_ready { "ok" } else { "pending" };

    let mut headers = HeaderMap::new();
    headers.insert(
        VULNRAG_STATUS_HEADER,
        HeaderValue::from_static(if is_ready { STATUS_READY } else { STATUS_ERROR }),
    );

    (
        status_code,
        headers,
        Json(ReadyResponse {
            status: status_msg,
            components,
        }),
    )
        .into_response()
}
