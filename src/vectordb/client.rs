use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder,
};
use tracing::{debug, warn};

use super::error::VectorDbError;
use super::model::{CveRecord, candidate_from_scored_point};
use crate::retrieval::RawCandidate;

#[derive(Clone)]
/// Qdrant-backed similarity store for vulnerability records.
pub struct QdrantStore {
    client: Qdrant,
    url: String,
    collection: String,
    vector_size: u64,
}

impl QdrantStore {
    /// Creates a client for `url`, bound to `collection`.
    pub fn new(url: &str, collection: &str, vector_size: u64) -> Result<Self, VectorDbError> {
        let client =
            Qdrant::from_url(url)
                .build()
                .map_err(|e| VectorDbError::ConnectionFailed {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;

        Ok(Self {
            client,
            url: url.to_string(),
            collection: collection.to_string(),
            vector_size,
        })
    }

    /// Returns the underlying Qdrant client.
    pub fn client(&self) -> &Qdrant {
        &self.client
    }

    /// Returns the configured URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Ensures the collection exists (cosine distance), creating it if missing.
    pub async fn ensure_collection(&self) -> Result<(), VectorDbError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| VectorDbError::CreateCollectionFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;

        if exists {
            return Ok(());
        }

        let vectors_config = VectorParamsBuilder::new(self.vector_size, Distance::Cosine);
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(vectors_config)
                    .on_disk_payload(true),
            )
            .await
            .map_err(|e| VectorDbError::CreateCollectionFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;

        debug!(collection = %self.collection, "Created collection");
        Ok(())
    }

    /// Indexes records, replacing any with the same CVE identifier.
    pub async fn upsert_records(&self, records: Vec<CveRecord>) -> Result<(), VectorDbError> {
        if records.is_empty() {
            return Ok(());
        }

        let points = records
            .into_iter()
            .map(|record| {
                if record.vector.len() as u64 != self.vector_size {
                    return Err(VectorDbError::InvalidDimension {
                        expected: self.vector_size as usize,
                        actual: record.vector.len(),
                    });
                }
                record.into_point()
            })
            .collect::<Result<Vec<PointStruct>, _>>()?;

        let count = points.len();
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| VectorDbError::UpsertFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;

        debug!(collection = %self.collection, count, "Upserted records");
        Ok(())
    }

    /// Top-`limit` records by cosine similarity, best first, with payloads and vectors.
    pub async fn search(
        &self,
        query: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<RawCandidate>, VectorDbError> {
        if query.len() as u64 != self.vector_size {
            return Err(VectorDbError::InvalidDimension {
                expected: self.vector_size as usize,
                actual: query.len(),
            });
        }

        let search = SearchPointsBuilder::new(&self.collection, query, limit)
            .with_payload(true)
            .with_vectors(true);

        let response = self
            .client
            .search_points(search)
            .await
            .map_err(|e| VectorDbError::from_search_failure(&self.collection, e.to_string()))?;

        let hits = response.result.len();
        let candidates = response
            .result
            .into_iter()
            .map(candidate_from_scored_point)
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|e| warn!(error = %e, "Similarity store returned a malformed point"))?;

        debug!(collection = %self.collection, hits, "Similarity search complete");
        Ok(candidates)
    }

    /// Performs a basic health check request.
    pub async fn health_check(&self) -> Result<(), VectorDbError> {
        self.client
            .health_check()
            .await
            .map_err(|e| VectorDbError::ConnectionFailed {
                url: self.url.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}

/// Source of scored candidates for a query vector.
///
/// Results are ordered best match first (ascending distance).
pub trait SimilarityStore: Send + Sync {
    /// Returns up to `limit` candidates for `query`.
    fn fetch_candidates(
        &self,
        query: Vec<f32>,
        limit: u64,
    ) -> impl std::future::Future<Output = Result<Vec<RawCandidate>, VectorDbError>> + Send;

    /// Checks that the store is reachable.
    fn health_check(&self) -> impl std::future::Future<Output = Result<(), VectorDbError>> + Send;
}

impl SimilarityStore for QdrantStore {
    async fn fetch_candidates(
        &self,
        query: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<RawCandidate>, VectorDbError> {
        self.search(query, limit).await
    }

    async fn health_check(&self) -> Result<(), VectorDbError> {
        self.health_check().await
    }
}
