//! Cross-cutting, shared constants.
//!
//! Prefer deriving secondary constants from primary ones to avoid drift.
//!
//! # Dimension Invariants
//!
//! The embedding dimension is model-specific (`nomic-embed-text` produces 768 floats). The
//! embedder, the similarity store and the pipeline must agree on it; use
//! [`validate_embedding_dim`] at module boundaries to catch mismatches early.

use thiserror::Error;

pub const DEFAULT_EMBEDDING_DIM: usize = 768;
pub const DEFAULT_VECTOR_SIZE_U64: u64 = DEFAULT_EMBEDDING_DIM as u64;

/// Number of candidates fetched from the similarity store per query.
pub const DEFAULT_CANDIDATE_LIMIT: u64 = 100;

/// Number of entries kept after MMR selection.
pub const DEFAULT_SELECT_K: usize = 20;

/// Diversity-heavy lambda, used for exhaustive surveys.
pub const LAMBDA_DIVERSE: f32 = 0.3;

/// Balanced lambda, used for general Q&A.
pub const LAMBDA_BALANCED: f32 = 0.5;

/// Rendered in place of the context block when nothing was selected.
pub const NO_RECORDS_SENTINEL: &str = "No relevant CVEs found.";

/// Separator placed between rendered records.
pub const RECORD_SEPARATOR: &str = "\n\n---\n\n";

/// Placeholder for missing record fields.
pub const MISSING_FIELD: &str = "N/A";

/// Maximum number of entries kept in the history listing.
pub const HISTORY_RETENTION: usize = 10;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_GENERATION_MODEL: &str = "deepseek-r1:1.5b";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION_NAME: &str = "cve_data";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DimValidationError {
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    Mismatch { expected: usize, actual: usize },

    #[error("embedding dimension cannot be zero")]
    ZeroDimension,
}

/// Validates that an embedding has the expected dimension.
pub fn validate_embedding_dim(expected: usize, actual: usize) -> Result<(), DimValidationError> {
    if expected == 0 {
        return Err(DimValidationError::ZeroDimension);
    }
    if expected != actual {
        return Err(DimValidationError::Mismatch { expected, actual });
    }
    Ok(())
}
