use async_trait::async_trait;

use crate::core::errors::RagError;

/// Text embedding collaborator.
///
/// Identical input must yield identical vectors for a given `model_id`.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier of the embedding space, reported in status output.
    fn model_id(&self) -> &str;

    /// Embeds `inputs`, returning one vector per input in the same order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    async fn embed_one(&self, input: &str) -> Result<Vec<f32>, RagError> {
        let mut vectors = self.embed(&[input.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::Embedding("embedding service returned no vector".to_string()))
    }
}
