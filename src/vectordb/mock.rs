use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::retrieval::RawCandidate;
use crate::retrieval::entry::cosine_distance;
use crate::vectordb::{CveRecord, SimilarityStore, VectorDbError};

const MOCK_COLLECTION: &str = "mock_cve_data";

/// How the mock reports pairwise distances among returned candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairwiseMode {
    /// Return raw embeddings; distances are computed downstream.
    #[default]
    Vectors,
    /// Return a precomputed id → distance lookup per candidate.
    Precomputed,
    /// Return distances (`1 - similarity`) instead of similarities, plus vectors.
    RawDistance,
}

/// In-memory similarity store using cosine similarity.
#[derive(Default)]
pub struct MockSimilarityStore {
    records: RwLock<Vec<CveRecord>>,
    mode: PairwiseMode,
    failing: RwLock<bool>,
    searches: AtomicUsize,
}

impl MockSimilarityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: PairwiseMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn with_records(self, records: Vec<CveRecord>) -> Self {
        if let Ok(mut guard) = self.records.write() {
            guard.extend(records);
        }
        self
    }

    pub fn insert(&self, record: CveRecord) -> Result<(), VectorDbError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| VectorDbError::UpsertFailed {
                collection: MOCK_COLLECTION.to_string(),
                message: "lock poisoned".to_string(),
            })?;
        records.retain(|r| r.cve_id != record.cve_id);
        records.push(record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes every subsequent call fail as if the store were unreachable.
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut guard) = self.failing.write() {
            *guard = failing;
        }
    }

    /// Number of searches served.
    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    fn is_failing(&self) -> bool {
        self.failing.read().map(|f| *f).unwrap_or(true)
    }
}

impl SimilarityStore for MockSimilarityStore {
    async fn fetch_candidates(
        &self,
        query: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<RawCandidate>, VectorDbError> {
        self.searches.fetch_add(1, Ordering::SeqCst);

        if self.is_failing() {
            return Err(VectorDbError::SearchFailed {
                collection: MOCK_COLLECTION.to_string(),
                message: "connection refused".to_string(),
            });
        }

        let records = self
            .records
            .read()
            .map_err(|_| VectorDbError::SearchFailed {
                collection: MOCK_COLLECTION.to_string(),
                message: "lock poisoned".to_string(),
            })?;

        let mut hits: Vec<(&CveRecord, f32)> = records
            .iter()
            .map(|r| (r, cosine_similarity(&query, &r.vector)))
            .collect();

        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit as usize);

        let candidates = hits
            .iter()
            .map(|(record, score)| {
                let candidate = RawCandidate::new(record.cve_id.clone(), record.record.clone());
                match self.mode {
                    PairwiseMode::Vectors => candidate
                        .with_similarity(*score)
                        .with_embedding(record.vector.clone()),
                    PairwiseMode::RawDistance => candidate
                        .with_distance(1.0 - *score)
                        .with_embedding(record.vector.clone()),
                    PairwiseMode::Precomputed => {
                        let lookup: HashMap<String, f32> = hits
                            .iter()
                            .filter(|(other, _)| other.cve_id != record.cve_id)
                            .filter_map(|(other, _)| {
                                cosine_distance(&record.vector, &other.vector)
                                    .map(|d| (other.cve_id.clone(), d))
                            })
                            .collect();
                        candidate.with_similarity(*score).with_pairwise(lookup)
                    }
                }
            })
            .collect();

        Ok(candidates)
    }

    async fn health_check(&self) -> Result<(), VectorDbError> {
        if self.is_failing() {
            return Err(VectorDbError::ConnectionFailed {
                url: "mock://qdrant".to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}
