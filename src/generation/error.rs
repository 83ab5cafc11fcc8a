use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("generation request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("generation stream interrupted: {reason}")]
    Upstream { reason: String },

    #[error("generation timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("generation stream cancelled")]
    Cancelled,
}
