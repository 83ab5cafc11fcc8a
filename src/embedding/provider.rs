use super::error::EmbeddingError;

/// Turns text into dense vectors.
///
/// Implementations return exactly one vector per input, each of [`embedding_dim`]
/// floats, or an error.
///
/// [`embedding_dim`]: EmbeddingProvider::embedding_dim
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a batch of inputs.
    fn embed(
        &self,
        inputs: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<Vec<f32>>, EmbeddingError>> + Send;

    /// Dimension of every produced vector.
    fn embedding_dim(&self) -> usize;

    /// Embeds a single input.
    fn embed_one(
        &self,
        input: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, EmbeddingError>> + Send {
        let inputs = vec![input.to_string()];
        async move {
            let mut vectors = self.embed(&inputs).await?;
            if vectors.len() != 1 {
                return Err(EmbeddingError::CountMismatch {
                    expected: 1,
                    actual: vectors.len(),
                });
            }
            Ok(vectors.remove(0))
        }
    }
}
