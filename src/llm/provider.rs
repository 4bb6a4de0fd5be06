use async_trait::async_trait;

use super::types::ChatRequest;
use crate::core::errors::ApiError;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// provider name as used in configuration ("openai", "ollama")
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// check if the provider is reachable
    async fn health_check(&self) -> Result<bool, ApiError>;

    /// chat completion (non-streaming), returns the assistant text
    async fn chat(&self, request: ChatRequest) -> Result<String, ApiError>;
}
