//! HTTP client helpers for tests.

use std::time::Duration;

use serde_json::{Value, json};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TestClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TestClientError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Unexpected status {0}: {1}")]
    UnexpectedStatus(u16, String),
}

impl TestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Status code plus JSON body (or `Value::Null` if the body is not JSON).
    pub async fn get(&self, path: &str) -> Result<(u16, Value), TestClientError> {
        let resp = self.client.get(self.url(path)).send().await?;
        let status = resp.status().as_u16();
        Ok((status, resp.json().await.unwrap_or(Value::Null)))
    }

    pub async fn query(
        &self,
        question: &str,
        chat_id: Option<u64>,
    ) -> Result<(u16, Value), TestClientError> {
        let resp = self
            .client
            .post(self.url("/query"))
            .json(&json!({ "question": question, "chat_id": chat_id }))
            .send()
            .await?;
        let status = resp.status().as_u16();
        Ok((status, resp.json().await.unwrap_or(Value::Null)))
    }

    /// Full SSE transcript as `(event, data)` pairs.
    pub async fn query_stream(
        &self,
        question: &str,
    ) -> Result<Vec<(String, Value)>, TestClientError> {
        let resp = self
            .client
            .post(self.url("/query/stream"))
            .json(&json!({ "question": question }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            return Err(TestClientError::UnexpectedStatus(
                status,
                resp.text().await.unwrap_or_default(),
            ));
        }

        Ok(parse_sse(&resp.text().await?))
    }
}

pub fn parse_sse(text: &str) -> Vec<(String, Value)> {
    text.split("\n\n")
        .filter_map(|block| {
            let mut name = None;
            let mut data = String::new();
            for line in block.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    name = Some(v.trim().to_string());
                } else if let Some(v) = line.strip_prefix("data:") {
                    data.push_str(v.trim_start());
                }
            }
            Some((name?, serde_json::from_str(&data).ok()?))
        })
        .collect()
}
