use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("no input text provided")]
    EmptyInput,

    #[error("embedding request to '{url}' failed: {reason}")]
    RequestFailed { url: String, reason: String },

    #[error("embedding provider returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("malformed embedding response: {reason}")]
    MalformedResponse { reason: String },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

impl EmbeddingError {
    /// `true` when the provider answered, but with data of the wrong shape.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            EmbeddingError::MalformedResponse { .. }
                | EmbeddingError::DimensionMismatch { .. }
                | EmbeddingError::CountMismatch { .. }
        )
    }
}
