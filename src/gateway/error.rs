use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::generation::GenerationError;
use crate::history::HistoryError;
use crate::retrieval::RetrievalError;

use super::VULNRAG_STATUS_HEADER;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("history error: {0}")]
    History(#[from] HistoryError),
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    pub kind: String,
}

impl GatewayError {
    /// HTTP status and machine-readable kind.
    pub fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            GatewayError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            GatewayError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            GatewayError::Retrieval(e) => {
                let status = match e {
                    RetrievalError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
                    RetrievalError::ProviderUnavailable { .. }
                    | RetrievalError::MalformedUpstreamData { .. } => StatusCode::BAD_GATEWAY,
                };
                (status, e.code())
            }
            GatewayError::Generation(GenerationError::EmptyPrompt) => {
                (StatusCode::BAD_REQUEST, "invalid_input")
            }
            GatewayError::Generation(_) => (StatusCode::BAD_GATEWAY, "provider_unavailable"),
            GatewayError::History(_) => (StatusCode::INTERNAL_SERVER_ERROR, "history_error"),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        if status.is_server_error() {
            tracing::error!(error = %self, kind, "Request failed");
        } else {
            tracing::debug!(error = %self, kind, "Request rejected");
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            VULNRAG_STATUS_HEADER,
            HeaderValue::from_str(kind).unwrap_or(HeaderValue::from_static("error")),
        );

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
            kind: kind.to_string(),
        });

        (status, headers, body).into_response()
    }
}
