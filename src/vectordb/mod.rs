//! Qdrant-backed similarity store.

pub mod client;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod model;


pub use client::{QdrantStore, SimilarityStore};
pub use error::VectorDbError;
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockSimilarityStore, PairwiseMode, cosine_similarity};
pub use model::{CveRecord, candidate_from_scored_point, parse_record, point_id_for};

pub const DEFAULT_COLLECTION_NAME: &str = crate::constants::DEFAULT_COLLECTION_NAME;

pub const DEFAULT_VECTOR_SIZE: u64 = crate::constants::DEFAULT_VECTOR_SIZE_U64;
