use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by similarity store operations.
pub enum VectorDbError {
    /// Could not connect to the Qdrant endpoint.
    #[error("failed to connect to Qdrant at '{url}': {message}")]
    ConnectionFailed {
        /// Endpoint URL.
        url: String,
        /// Error message.
        message: String,
    },

    /// Collection creation failed.
    #[error("failed to create collection '{collection}': {message}")]
    CreateCollectionFailed {
        /// Collection name.
        collection: String,
        /// Error message.
        message: String,
    },

    /// Collection does not exist.
    #[error("collection not found: {collection}")]
    CollectionNotFound {
        /// Collection name.
        collection: String,
    },

    /// Upsert failed.
    #[error("failed to upsert points to '{collection}': {message}")]
    UpsertFailed {
        /// Collection name.
        collection: String,
        /// Error message.
        message: String,
    },

    /// Search failed.
    #[error("failed to search in '{collection}': {message}")]
    SearchFailed {
        /// Collection name.
        collection: String,
        /// Error message.
        message: String,
    },

    /// Vector dimension mismatch.
    #[error("invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension.
        actual: usize,
    },

    /// A stored point lacks a required payload field or carries an unparseable one.
    #[error("malformed point {point}: {reason}")]
    MalformedPoint {
        /// Point id (or `"?"` if absent).
        point: String,
        /// What was wrong.
        reason: String,
    },
}

impl VectorDbError {
    /// Classifies a failed search; a missing collection gets its own variant.
    pub fn from_search_failure(collection: &str, message: String) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("not found") && lower.contains("collection") {
            VectorDbError::CollectionNotFound {
                collection: collection.to_string(),
            }
        } else {
            VectorDbError::SearchFailed {
                collection: collection.to_string(),
                message,
            }
        }
    }

    /// `true` when the store answered, but with rows of the wrong shape.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            VectorDbError::MalformedPoint { .. } | VectorDbError::InvalidDimension { .. }
        )
    }
}
