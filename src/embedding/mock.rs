use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use serde_json::json;

use super::error::EmbeddingError;
use super::ollama::parse_embed_response;
use super::provider::EmbeddingProvider;
use crate::retrieval::entry::normalize;

/// Failure modes the mock can be told to reproduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockEmbedFailure {
    /// Behaves like an unreachable server.
    Unavailable,
    /// Answers with a non-array embedding.
    NonArray,
    /// Answers with vectors of the wrong dimension.
    WrongDimension,
}

/// Deterministic in-process embedder.
///
/// Unknown texts map to a hash-seeded unit vector; specific texts can be pinned with
/// [`with_vector`](MockEmbedder::with_vector).
#[derive(Debug)]
pub struct MockEmbedder {
    embedding_dim: usize,
    pinned: RwLock<HashMap<String, Vec<f32>>>,
    failure: RwLock<Option<MockEmbedFailure>>,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new(embedding_dim: usize) -> Self {
        Self {
            embedding_dim,
            pinned: RwLock::new(HashMap::new()),
            failure: RwLock::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_vector(self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.pinned.write().insert(text.into(), vector);
        self
    }

    pub fn fail_with(&self, failure: MockEmbedFailure) {
        *self.failure.write() = Some(failure);
    }

    pub fn clear_failure(&self) {
        *self.failure.write() = None;
    }

    /// Number of `embed` calls observed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(v) = self.pinned.read().get(text) {
            return v.clone();
        }
        hashed_unit_vector(text, self.embedding_dim)
    }
}

impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if inputs.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let failure = *self.failure.read();
        match failure {
            Some(MockEmbedFailure::Unavailable) => Err(EmbeddingError::RequestFailed {
                url: "mock://embed".to_string(),
                reason: "connection refused".to_string(),
            }),
            Some(MockEmbedFailure::NonArray) => {
                let rows: Vec<&str> = inputs.iter().map(|_| "oops").collect();
                let body = json!({ "embeddings": rows });
                parse_embed_response(body, inputs.len(), self.embedding_dim)
            }
            Some(MockEmbedFailure::WrongDimension) => {
                let rows: Vec<Vec<f32>> = inputs.iter().map(|_| vec![0.5; 3]).collect();
                let body = json!({ "embeddings": rows });
                parse_embed_response(body, inputs.len(), self.embedding_dim)
            }
            None => Ok(inputs.iter().map(|text| self.vector_for(text)).collect()),
        }
    }

    fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }
}

/// Unit vector seeded from the hash of `text`.
pub fn hashed_unit_vector(text: &str, dim: usize) -> Vec<f32> {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let mut state = hasher.finish() | 1;

    let mut v: Vec<f32> = (0..dim)
        .map(|_| {
            // xorshift64
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state % 2000) as f32 / 1000.0 - 1.0
        })
        .collect();
    normalize(&mut v);
    v
}
