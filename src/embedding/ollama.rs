//! Ollama `/api/embed` client.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::error::EmbeddingError;
use super::provider::EmbeddingProvider;

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Body of a successful `/api/embed` reply; other fields are ignored.
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedding provider backed by an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    embedding_dim: usize,
}

impl OllamaEmbedder {
    /// Creates a client for `base_url` (e.g. `http://localhost:11434`).
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        embedding_dim: usize,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let endpoint = format!("{}/api/embed", base_url.trim_end_matches('/'));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::RequestFailed {
                url: endpoint.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            endpoint,
            model: model.into(),
            embedding_dim,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if inputs.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        debug!(
            model = %self.model,
            inputs = inputs.len(),
            "Requesting embeddings"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbedRequest {
                model: &self.model,
                input: inputs,
            })
            .send()
            .await
            .map_err(|e| EmbeddingError::RequestFailed {
                url: self.endpoint.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::MalformedResponse {
                reason: format!("unexpected embed response: {}", e),
            })?;

        check_embeddings(body, inputs.len(), self.embedding_dim)
    }

    fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }
}

/// Extracts `{"embeddings": [[f32; dim]; count]}` from an Ollama response body.
pub fn parse_embed_response(
    body: Value,
    expected_count: usize,
    expected_dim: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let response: EmbedResponse =
        serde_json::from_value(body).map_err(|e| EmbeddingError::MalformedResponse {
            reason: format!("unexpected embed response shape: {}", e),
        })?;
    check_embeddings(response, expected_count, expected_dim)
}

fn check_embeddings(
    response: EmbedResponse,
    expected_count: usize,
    expected_dim: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let rows = response.embeddings;
    if rows.len() != expected_count {
        return Err(EmbeddingError::CountMismatch {
            expected: expected_count,
            actual: rows.len(),
        });
    }

    for (index, row) in rows.iter().enumerate() {
        if row.len() != expected_dim {
            return Err(EmbeddingError::DimensionMismatch {
                expected: expected_dim,
                actual: row.len(),
            });
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(EmbeddingError::MalformedResponse {
                reason: format!("embedding {} contains a non-finite value", index),
            });
        }
    }

    Ok(rows)
}
