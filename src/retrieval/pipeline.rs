//! Query → context coordinator: embed, fetch candidates, select, render.

use std::time::Duration;

use tracing::{debug, info, instrument};

use super::accessor::normalize_candidates;
use super::error::{RetrievalError, Stage};
use super::mmr::{Selection, SelectionParams, select};
use super::prompt::PromptTemplate;
use super::render::ContextRenderer;
use crate::constants::{DEFAULT_CANDIDATE_LIMIT, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::embedding::EmbeddingProvider;
use crate::vectordb::SimilarityStore;

/// Runs one query through the retrieval stages.
///
/// Holds no per-request state, so one instance can serve concurrent queries behind an `Arc`.
pub struct RetrievalPipeline<E, S> {
    embedder: E,
    store: S,
    params: SelectionParams,
    candidate_limit: u64,
    stage_timeout: Duration,
    renderer: ContextRenderer,
    template: PromptTemplate,
}

impl<E, S> std::fmt::Debug for RetrievalPipeline<E, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalPipeline")
            .field("params", &self.params)
            .field("candidate_limit", &self.candidate_limit)
            .field("stage_timeout", &self.stage_timeout)
            .finish()
    }
}

impl<E: EmbeddingProvider, S: SimilarityStore> RetrievalPipeline<E, S> {
    pub fn new(embedder: E, store: S, params: SelectionParams) -> Self {
        Self {
            embedder,
            store,
            params,
            candidate_limit: DEFAULT_CANDIDATE_LIMIT,
            stage_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            renderer: ContextRenderer::new(),
            template: PromptTemplate::default(),
        }
    }

    /// Number of candidates requested from the store per query. Must be at least 1.
    pub fn with_candidate_limit(mut self, limit: u64) -> Result<Self, RetrievalError> {
        if limit == 0 {
            return Err(RetrievalError::InvalidInput {
                reason: "candidate limit must be at least 1".to_string(),
            });
        }
        self.candidate_limit = limit;
        Ok(self)
    }

    /// Timeout applied separately to the embedding and the store call.
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn params(&self) -> &SelectionParams {
        &self.params
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Embeds `query`, fetches candidates and returns the MMR selection.
    #[instrument(skip(self), fields(k = self.params.k(), lambda = self.params.lambda()))]
    pub async fn build_selection(&self, query: &str) -> Result<Selection, RetrievalError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RetrievalError::InvalidInput {
                reason: "query is empty".to_string(),
            });
        }

        let query_vector = self.embed_query(query).await?;

        let rows = tokio::time::timeout(
            self.stage_timeout,
            self.store.fetch_candidates(query_vector, self.candidate_limit),
        )
        .await
        .map_err(|_| RetrievalError::timeout(Stage::SimilarityStore, self.stage_timeout))??;
        debug!(candidates = rows.len(), "Fetched candidates");

        let entries = normalize_candidates(rows)?;
        let selection = select(entries, &self.params);

        info!(
            selected = selection.len(),
            exhausted = selection.is_exhausted(),
            "Selected context records"
        );
        Ok(selection)
    }

    /// Renders the selected records as grounding text.
    pub async fn build_context(&self, query: &str) -> Result<String, RetrievalError> {
        let selection = self.build_selection(query).await?;
        Ok(self.renderer.render(selection.entries()))
    }

    /// Builds the full prompt for the generation provider.
    pub async fn build_prompt(&self, query: &str) -> Result<String, RetrievalError> {
        let context = self.build_context(query).await?;
        let prompt = self.template.compose(query, &context);
        debug!(prompt_len = prompt.len(), prompt = %prompt, "Composed prompt");
        Ok(prompt)
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, RetrievalError> {
        let inputs = vec![query.to_string()];
        let mut vectors =
            tokio::time::timeout(self.stage_timeout, self.embedder.embed(&inputs))
                .await
                .map_err(|_| RetrievalError::timeout(Stage::Embedding, self.stage_timeout))??;

        if vectors.len() != 1 {
            return Err(RetrievalError::MalformedUpstreamData {
                stage: Stage::Embedding,
                reason: format!("expected 1 vector, got {}", vectors.len()),
            });
        }
        let vector = vectors.remove(0);

        let expected = self.embedder.embedding_dim();
        crate::constants::validate_embedding_dim(expected, vector.len()).map_err(|e| {
            RetrievalError::MalformedUpstreamData {
                stage: Stage::Embedding,
                reason: e.to_string(),
            }
        })?;
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(RetrievalError::MalformedUpstreamData {
                stage: Stage::Embedding,
                reason: "embedding contains non-finite values".to_string(),
            });
        }

        Ok(vector)
    }
}
