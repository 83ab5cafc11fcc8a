use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::generation::GenerationError;
use crate::vectordb::VectorDbError;

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Embedding,
    SimilarityStore,
    Generation,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Embedding => write!(f, "embedding"),
            Stage::SimilarityStore => write!(f, "similarity store"),
            Stage::Generation => write!(f, "generation"),
        }
    }
}

#[derive(Debug, Error)]
/// Errors surfaced by the retrieval pipeline to its caller.
pub enum RetrievalError {
    /// Blank query or out-of-bounds selection parameters. Raised before any network call.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// A collaborator failed or timed out.
    #[error("{stage} provider unavailable: {reason}")]
    ProviderUnavailable { stage: Stage, reason: String },

    /// A collaborator answered with data of the wrong shape.
    #[error("malformed {stage} data: {reason}")]
    MalformedUpstreamData { stage: Stage, reason: String },
}

impl RetrievalError {
    /// Short machine-readable category, stable across messages.
    pub fn code(&self) -> &'static str {
        match self {
            RetrievalError::InvalidInput { .. } => "invalid_input",
            RetrievalError::ProviderUnavailable { .. } => "provider_unavailable",
            RetrievalError::MalformedUpstreamData { .. } => "malformed_upstream_data",
        }
    }

    pub(crate) fn timeout(stage: Stage, after: std::time::Duration) -> Self {
        RetrievalError::ProviderUnavailable {
            stage,
            reason: format!("timed out after {:?}", after),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
/// Errors raised by the MMR selector.
pub enum SelectionError {
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
/// Errors raised while normalizing raw store rows into candidate entries.
pub enum AccessorError {
    #[error("candidate at position {index} has no identifier")]
    MissingIdentifier { index: usize },

    #[error("candidate '{id}' has neither a distance nor a similarity")]
    MissingRelevance { id: String },

    #[error("candidate '{id}' has a non-finite relevance value")]
    NonFiniteRelevance { id: String },

    #[error("candidate '{id}' carries distance {distance} and similarity {similarity}, which disagree")]
    ConflictingRelevance {
        id: String,
        distance: f32,
        similarity: f32,
    },

    #[error("candidate '{id}' has no pairwise distance source")]
    MissingDistanceSource { id: String },

    #[error("candidate '{id}' embedding has dimension {actual}, batch uses {expected}")]
    InconsistentDimension {
        id: String,
        expected: usize,
        actual: usize,
    },

    #[error("candidate '{id}' appears more than once in the batch")]
    DuplicateIdentifier { id: String },
}

impl From<SelectionError> for RetrievalError {
    fn from(err: SelectionError) -> Self {
        RetrievalError::InvalidInput {
            reason: err.to_string(),
        }
    }
}

impl From<AccessorError> for RetrievalError {
    fn from(err: AccessorError) -> Self {
        RetrievalError::MalformedUpstreamData {
            stage: Stage::SimilarityStore,
            reason: err.to_string(),
        }
    }
}

impl From<EmbeddingError> for RetrievalError {
    fn from(err: EmbeddingError) -> Self {
        let reason = err.to_string();
        if err.is_malformed() {
            RetrievalError::MalformedUpstreamData {
                stage: Stage::Embedding,
                reason,
            }
        } else {
            RetrievalError::ProviderUnavailable {
                stage: Stage::Embedding,
                reason,
            }
        }
    }
}

impl From<VectorDbError> for RetrievalError {
    fn from(err: VectorDbError) -> Self {
        let reason = err.to_string();
        if err.is_malformed() {
            RetrievalError::MalformedUpstreamData {
                stage: Stage::SimilarityStore,
                reason,
            }
        } else {
            RetrievalError::ProviderUnavailable {
                stage: Stage::SimilarityStore,
                reason,
            }
        }
    }
}

impl From<GenerationError> for RetrievalError {
    fn from(err: GenerationError) -> Self {
        RetrievalError::ProviderUnavailable {
            stage: Stage::Generation,
            reason: err.to_string(),
        }
    }
}
