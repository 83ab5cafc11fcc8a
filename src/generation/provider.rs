use std::time::Duration;

use futures_util::stream::StreamExt;
use genai::Client;
use genai::chat::{ChatMessage, ChatRequest, ChatStreamEvent};
use tokio::time::Instant;
use tracing::{debug, error};

use super::error::GenerationError;
use super::stream::GenerationStream;

/// Streams generated text for a prompt.
pub trait GenerationProvider: Send + Sync {
    /// Starts generation. Errors starting the request are returned directly; errors after
    /// the first chunk arrive as a terminal stream event.
    fn generate_stream(
        &self,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<GenerationStream, GenerationError>> + Send;

    /// Runs generation to completion and returns the raw text.
    fn generate(
        &self,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String, GenerationError>> + Send {
        async move { self.generate_stream(prompt).await?.collect_text().await }
    }
}

/// Generation through the `genai` client (Ollama and other chat backends).
#[derive(Clone)]
pub struct GenaiGenerator {
    client: Client,
    model: String,
    timeout: Duration,
}

impl std::fmt::Debug for GenaiGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenaiGenerator")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GenaiGenerator {
    pub fn new(client: Client, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            model: model.into(),
            timeout,
        }
    }

    /// Uses the default `genai` client, which routes unknown model names to a local Ollama.
    pub fn with_default_client(model: impl Into<String>, timeout: Duration) -> Self {
        Self::new(Client::default(), model, timeout)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl GenerationProvider for GenaiGenerator {
    async fn generate_stream(&self, prompt: &str) -> Result<GenerationStream, GenerationError> {
        if prompt.trim().is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        let request = ChatRequest::new(vec![ChatMessage::user(prompt)]);

        debug!(model = %self.model, prompt_len = prompt.len(), "Starting generation stream");

        // One deadline covers both opening the stream and draining it.
        let expires_at = Instant::now() + self.timeout;
        let response = tokio::time::timeout_at(
            expires_at,
            self.client.exec_chat_stream(&self.model, request, None),
        )
        .await
        .map_err(|_| GenerationError::Timeout {
            after: self.timeout,
        })?
        .map_err(|e| {
            error!("Provider stream init error: {}", e);
            GenerationError::RequestFailed {
                reason: e.to_string(),
            }
        })?;

        let upstream = response.stream.filter_map(|event| async move {
            match event {
                Ok(ChatStreamEvent::Chunk(chunk)) if !chunk.content.is_empty() => {
                    Some(Ok(chunk.content))
                }
                Ok(_) => None,
                Err(e) => {
                    error!("Stream error: {}", e);
                    Some(Err(GenerationError::Upstream {
                        reason: e.to_string(),
                    }))
                }
            }
        });

        Ok(GenerationStream::spawn_until(upstream, expires_at, self.timeout))
    }
}
