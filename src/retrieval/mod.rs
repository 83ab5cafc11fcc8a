//! Retrieval core.
//!
//! A query is embedded, the similarity store returns a candidate batch, the batch is
//! normalized into [`CandidateEntry`] values, MMR picks a relevant but diverse subset,
//! and the subset is rendered into grounding text for the generation prompt.
//!
//! ```text
//! query ─► EmbeddingProvider ─► SimilarityStore ─► accessor ─► mmr ─► render ─► prompt
//! ```

pub mod accessor;
pub mod entry;
pub mod error;
pub mod mmr;
pub mod pipeline;
pub mod prompt;
pub mod render;

#[cfg(test)]
mod tests;

pub use accessor::{RawCandidate, normalize_candidates};
pub use entry::{CandidateEntry, DistanceSource, VulnerabilityRecord};
pub use error::{AccessorError, RetrievalError, SelectionError, Stage};
pub use mmr::{Selection, SelectionParams, mmr_score, select, select_with};
pub use pipeline::RetrievalPipeline;
pub use prompt::PromptTemplate;
pub use render::{ContextRenderer, render};
