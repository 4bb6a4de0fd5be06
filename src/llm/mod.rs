pub mod ollama;
pub mod openai;
pub mod provider;
pub mod service;
pub mod types;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use provider::LlmProvider;
pub use service::{build_provider, LlmComparator, LlmGenerator};
pub use types::{ChatMessage, ChatRequest};
