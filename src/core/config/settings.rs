//! Typed view over the merged YAML configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::ApiError;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub store: StoreSettings,
    pub embedding: EmbeddingSettings,
    pub generation: ProviderSettings,
    /// Falls back to `generation` when absent.
    pub comparator: Option<ProviderSettings>,
    pub rag: RagSettings,
    pub generation_loop: LoopSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn from_value(value: &Value) -> Result<Self, ApiError> {
        serde_json::from_value(value.clone())
            .map_err(|err| ApiError::BadRequest(format!("Invalid config: {}", err)))
    }

    pub fn comparator_settings(&self) -> &ProviderSettings {
        self.comparator.as_ref().unwrap_or(&self.generation)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Defaults to `examples.db` in the user data directory.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    Http,
    #[default]
    Hashing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingBackend,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub dimensions: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::default(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key: None,
            dimensions: 384,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Ollama,
}

impl ProviderKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(ProviderKind::OpenAi),
            "ollama" => Some(ProviderKind::Ollama),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Ollama => "ollama",
        }
    }
}

/// Connection and sampling parameters for one chat provider.
///
/// Unset values resolve to per-provider defaults through the `effective_*` accessors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub provider: ProviderKind,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub probe_timeout_secs: Option<u64>,
}

impl ProviderSettings {
    pub fn effective_base_url(&self) -> String {
        match (&self.base_url, self.provider) {
            (Some(url), _) if !url.trim().is_empty() => url.trim().to_string(),
            (_, ProviderKind::OpenAi) => DEFAULT_OPENAI_BASE_URL.to_string(),
            (_, ProviderKind::Ollama) => DEFAULT_OLLAMA_BASE_URL.to_string(),
        }
    }

    pub fn effective_model(&self) -> String {
        match (&self.model, self.provider) {
            (Some(model), _) if !model.trim().is_empty() => model.trim().to_string(),
            (_, ProviderKind::OpenAi) => "gpt-4o-mini".to_string(),
            (_, ProviderKind::Ollama) => "qwen3:8b".to_string(),
        }
    }

    pub fn effective_temperature(&self) -> f64 {
        self.temperature.unwrap_or(match self.provider {
            ProviderKind::OpenAi => 0.0,
            ProviderKind::Ollama => 0.1,
        })
    }

    pub fn effective_top_p(&self) -> Option<f64> {
        match self.provider {
            ProviderKind::OpenAi => self.top_p,
            ProviderKind::Ollama => Some(self.top_p.unwrap_or(0.9)),
        }
    }

    pub fn effective_max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(match self.provider {
            ProviderKind::OpenAi => 5000,
            ProviderKind::Ollama => 10000,
        })
    }

    pub fn effective_timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(match self.provider {
            ProviderKind::OpenAi => 120,
            ProviderKind::Ollama => 200,
        })
    }

    pub fn effective_probe_timeout_secs(&self) -> u64 {
        self.probe_timeout_secs.unwrap_or(5)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub max_results: usize,
    pub confidence_threshold: f32,
    /// Retry without the metadata filter when the filtered search is empty.
    pub filter_fallback: bool,
    pub ingest_batch_size: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            max_results: 5,
            confidence_threshold: 0.7,
            filter_fallback: false,
            ingest_batch_size: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopSettings {
    /// Upper bound for a single generation or comparator call.
    pub attempt_timeout_secs: u64,
    /// Deadline for the whole retry loop of one request.
    pub request_timeout_secs: u64,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            attempt_timeout_secs: 240,
            request_timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
