use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::ollama::OllamaProvider;
use super::openai::OpenAiProvider;
use super::provider::LlmProvider;
use super::types::{ChatMessage, ChatRequest};
use crate::core::config::settings::{ProviderKind, ProviderSettings};
use crate::core::errors::{ApiError, RagError};
use crate::generation::{ComparatorService, GenerationService, ValidationVerdict};
use crate::prompt::{comparator_user_message, COMPARATOR_SYSTEM_PROMPT, GENERATION_SYSTEM_PROMPT};

pub fn build_provider(settings: &ProviderSettings) -> Result<Arc<dyn LlmProvider>, ApiError> {
    let timeout = Duration::from_secs(settings.effective_timeout_secs());
    let provider: Arc<dyn LlmProvider> = match settings.provider {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(
            settings.effective_base_url(),
            settings.effective_model(),
            settings.api_key.clone(),
            timeout,
        )?),
        ProviderKind::Ollama => Arc::new(OllamaProvider::new(
            settings.effective_base_url(),
            settings.effective_model(),
            timeout,
            Duration::from_secs(settings.effective_probe_timeout_secs()),
        )?),
    };
    Ok(provider)
}

/// Generation service backed by a chat provider.
pub struct LlmGenerator {
    provider: Arc<dyn LlmProvider>,
    settings: ProviderSettings,
}

impl LlmGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: ProviderSettings) -> Self {
        Self { provider, settings }
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }
}

#[async_trait]
impl GenerationService for LlmGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, RagError> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(GENERATION_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ])
        .with_settings(&self.settings);

        let reply = self
            .provider
            .chat(request)
            .await
            .map_err(|err| RagError::GenerationService(err.to_string()))?;

        if reply.trim().is_empty() {
            return Err(RagError::GenerationService(format!(
                "{} returned an empty reply",
                self.provider.name()
            )));
        }
        Ok(reply)
    }
}

/// Structural comparator backed by a chat provider.
pub struct LlmComparator {
    provider: Arc<dyn LlmProvider>,
    settings: ProviderSettings,
}

impl LlmComparator {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: ProviderSettings) -> Self {
        Self { provider, settings }
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }
}

#[async_trait]
impl ComparatorService for LlmComparator {
    async fn compare(&self, reference: &str, candidate: &str) -> Result<ValidationVerdict, RagError> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(COMPARATOR_SYSTEM_PROMPT),
            ChatMessage::user(comparator_user_message(reference, candidate)),
        ])
        .with_settings(&self.settings);

        let reply = self
            .provider
            .chat(request)
            .await
            .map_err(|err| RagError::ComparatorService(err.to_string()))?;

        ValidationVerdict::parse(&reply)
    }
}
