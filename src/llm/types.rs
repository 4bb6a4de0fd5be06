use serde::{Deserialize, Serialize};

use crate::core::config::settings::ProviderSettings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub stop: Option<Vec<String>>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: None,
            top_p: None,
            max_tokens: None,
            stop: None,
        }
    }

    /// Applies the sampling parameters configured for a provider section.
    pub fn with_settings(mut self, settings: &ProviderSettings) -> Self {
        self.temperature = Some(settings.effective_temperature());
        self.top_p = settings.effective_top_p();
        self.max_tokens = Some(settings.effective_max_tokens());
        self
    }

    /// Folds every message into one prompt for endpoints without chat roles.
    pub fn flattened_prompt(&self) -> String {
        self.messages
            .iter()
            .map(|message| message.content.trim())
            .filter(|content| !content.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::settings::ProviderKind;

    #[test]
    fn settings_fill_sampling_parameters() {
        let settings = ProviderSettings {
            provider: ProviderKind::Ollama,
            ..ProviderSettings::default()
        };
        let request = ChatRequest::new(vec![ChatMessage::user("hi")]).with_settings(&settings);
        assert_eq!(request.temperature, Some(0.1));
        assert_eq!(request.top_p, Some(0.9));
        assert_eq!(request.max_tokens, Some(10000));
    }

    #[test]
    fn flattened_prompt_joins_non_empty_messages() {
        let request = ChatRequest::new(vec![
            ChatMessage::system("rules"),
            ChatMessage::user("  "),
            ChatMessage::user("task"),
        ]);
        assert_eq!(request.flattened_prompt(), "rules\n\ntask");
    }
}
