//! vulnrag library crate (used by the server binary and integration tests).
//!
//! Answers security questions with an LLM grounded in vulnerability records. A question is
//! embedded, candidate CVE records are fetched from a similarity store, Maximal Marginal
//! Relevance picks a relevant but non-redundant subset, and the subset is rendered into the
//! generation prompt.
//!
//! # Public API Surface
//!
//! ## Retrieval core
//! - [`select`], [`select_with`], [`SelectionParams`], [`Selection`] - MMR selection
//! - [`CandidateEntry`], [`DistanceSource`], [`VulnerabilityRecord`] - candidate model
//! - [`normalize_candidates`], [`RawCandidate`] - store rows to candidates
//! - [`render`], [`ContextRenderer`], [`PromptTemplate`] - grounding text
//! - [`RetrievalPipeline`] - embed, search, select and render for one query
//!
//! ## Providers
//! - [`EmbeddingProvider`], [`OllamaEmbedder`] - query embeddings
//! - [`SimilarityStore`], [`QdrantStore`] - candidate search
//! - [`GenerationProvider`], [`GenaiGenerator`] - streamed answers
//!
//! ## Server plumbing
//! - [`Config`], [`ConfigError`] - environment configuration
//! - [`ChatService`], [`JsonChatRepository`] - chat history persistence
//! - [`gateway`] - Axum router and handlers
//!
//! ## Test/Mock Support
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod config;
pub mod constants;
pub mod embedding;
pub mod gateway;
pub mod generation;
pub mod history;
pub mod retrieval;
pub mod vectordb;

pub use config::{Config, ConfigError};
pub use constants::{DimValidationError, validate_embedding_dim};
pub use embedding::{EmbeddingError, EmbeddingProvider, OllamaEmbedder};
pub use generation::{
    GenaiGenerator, GenerationError, GenerationProvider, GenerationStream, StreamEvent,
    StreamRegistry, clean_response,
};
pub use history::{ChatRepository, ChatService, HistoryError, JsonChatRepository};
pub use retrieval::{
    CandidateEntry, ContextRenderer, DistanceSource, PromptTemplate, RawCandidate,
    RetrievalError, RetrievalPipeline, Selection, SelectionError, SelectionParams, Stage,
    VulnerabilityRecord, normalize_candidates, render, select, select_with,
};
pub use vectordb::{CveRecord, QdrantStore, SimilarityStore, VectorDbError};

#[cfg(any(test, feature = "mock"))]
pub use embedding::MockEmbedder;
#[cfg(any(test, feature = "mock"))]
pub use generation::MockGenerator;
#[cfg(any(test, feature = "mock"))]
pub use history::InMemoryChatRepository;
#[cfg(any(test, feature = "mock"))]
pub use vectordb::MockSimilarityStore;
