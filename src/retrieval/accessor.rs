//! Normalization of raw store rows into [`CandidateEntry`] values.
//!
//! Two relevance encodings are accepted (`distance`, lower is better, and `similarity`,
//! higher is better) and two pairwise-distance sources (precomputed lookups and raw
//! embeddings). Everything leaving this module uses the similarity convention.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::entry::{CandidateEntry, DistanceSource, VulnerabilityRecord};
use super::error::AccessorError;

/// Tolerance when a row carries both encodings and they must agree (`s == 1 - d`).
const RELEVANCE_AGREEMENT_EPSILON: f32 = 1e-3;

/// A candidate row as returned by a similarity store, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCandidate {
    pub id: Option<String>,
    pub payload: VulnerabilityRecord,
    pub distance: Option<f32>,
    pub similarity: Option<f32>,
    pub embedding: Option<Vec<f32>>,
    pub pairwise: Option<HashMap<String, f32>>,
}

impl RawCandidate {
    pub fn new(id: impl Into<String>, payload: VulnerabilityRecord) -> Self {
        Self {
            id: Some(id.into()),
            payload,
            ..Default::default()
        }
    }

    pub fn with_distance(mut self, distance: f32) -> Self {
        self.distance = Some(distance);
        self
    }

    pub fn with_similarity(mut self, similarity: f32) -> Self {
        self.similarity = Some(similarity);
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_pairwise(mut self, pairwise: HashMap<String, f32>) -> Self {
        self.pairwise = Some(pairwise);
        self
    }
}

/// Validates and converts a batch of raw rows, preserving their order.
pub fn normalize_candidates(
    rows: Vec<RawCandidate>,
) -> Result<Vec<CandidateEntry>, AccessorError> {
    let mut seen = HashSet::with_capacity(rows.len());
    let mut batch_dim: Option<usize> = None;
    let mut entries = Vec::with_capacity(rows.len());

    for (index, row) in rows.into_iter().enumerate() {
        let entry = normalize_candidate(index, row)?;

        if let DistanceSource::Vector(v) = &entry.distances {
            match batch_dim {
                None => batch_dim = Some(v.len()),
                Some(expected) if expected != v.len() => {
                    return Err(AccessorError::InconsistentDimension {
                        id: entry.id,
                        expected,
                        actual: v.len(),
                    });
                }
                Some(_) => {}
            }
        }

        if !seen.insert(entry.id.clone()) {
            return Err(AccessorError::DuplicateIdentifier { id: entry.id });
        }

        entries.push(entry);
    }

    debug!(candidates = entries.len(), "Normalized candidate batch");
    Ok(entries)
}

/// Converts a single row. `index` is only used for error reporting.
pub fn normalize_candidate(
    index: usize,
    row: RawCandidate,
) -> Result<CandidateEntry, AccessorError> {
    let id = row
        .id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or(AccessorError::MissingIdentifier { index })?;

    let similarity = match (row.distance, row.similarity) {
        (None, None) => return Err(AccessorError::MissingRelevance { id }),
        (Some(d), None) => 1.0 - d,
        (None, Some(s)) => s,
        (Some(d), Some(s)) => {
            if d.is_finite() && s.is_finite() && (1.0 - d - s).abs() > RELEVANCE_AGREEMENT_EPSILON
            {
                return Err(AccessorError::ConflictingRelevance {
                    id,
                    distance: d,
                    similarity: s,
                });
            }
            s
        }
    };

    if !similarity.is_finite() {
        return Err(AccessorError::NonFiniteRelevance { id });
    }

    let distances = match (row.pairwise, row.embedding) {
        (Some(lookup), _) => DistanceSource::Lookup(lookup),
        (None, Some(vector)) if !vector.is_empty() => DistanceSource::Vector(vector),
        _ => return Err(AccessorError::MissingDistanceSource { id }),
    };

    Ok(CandidateEntry {
        id,
        payload: row.payload,
        similarity,
        distances,
    })
}
