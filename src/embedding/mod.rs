//! Embedding providers.
//!
//! - [`OllamaEmbedder`] calls an Ollama server's `/api/embed` endpoint.
//! - [`MockEmbedder`] is a deterministic in-process stand-in (tests / `mock` feature).

mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod ollama;
mod provider;


pub use error::EmbeddingError;
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockEmbedFailure, MockEmbedder};
pub use ollama::{OllamaEmbedder, parse_embed_response};
pub use provider::EmbeddingProvider;
