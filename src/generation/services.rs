use async_trait::async_trait;

use super::types::ValidationVerdict;
use crate::core::errors::RagError;

/// Produces a candidate script for a fully rendered prompt. Stateless.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, RagError>;
}

/// Scores the structural equivalence of two normalized scripts.
#[async_trait]
pub trait ComparatorService: Send + Sync {
    async fn compare(&self, reference: &str, candidate: &str)
        -> Result<ValidationVerdict, RagError>;
}
