use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::errors::ApiError;

/// Client for a local Ollama daemon (`/api/chat`).
#[derive(Clone)]
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: Client,
    probe_client: Client,
}

impl OllamaProvider {
    pub fn new(
        base_url: String,
        model: String,
        timeout: Duration,
        probe_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::internal)?;
        let probe_client = Client::builder()
            .timeout(probe_timeout)
            .build()
            .map_err(ApiError::internal)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            client,
            probe_client,
        })
    }

    fn request_body(&self, request: ChatRequest) -> Value {
        let mut options = Map::new();
        if let Some(t) = request.temperature { options.insert("temperature".to_string(), json!(t)); }
        if let Some(t) = request.top_p { options.insert("top_p".to_string(), json!(t)); }
        if let Some(t) = request.max_tokens { options.insert("num_predict".to_string(), json!(t)); }
        if let Some(s) = request.stop { options.insert("stop".to_string(), json!(s)); }

        json!({
            "model": self.model,
            "messages": request.messages,
            "stream": false,
            "options": options,
        })
    }
}

fn message_text(payload: &Value) -> Result<String, ApiError> {
    payload["message"]["content"]
        .as_str()
        .or_else(|| payload["response"].as_str())
        .map(str::to_string)
        .ok_or_else(|| ApiError::Internal("Ollama response has no message content".to_string()))
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        let url = format!("{}/api/tags", self.base_url);
        match self.probe_client.get(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, ApiError> {
        if !self.health_check().await? {
            return Err(ApiError::Unavailable(format!(
                "Ollama is not reachable at {}",
                self.base_url
            )));
        }

        let url = format!("{}/api/chat", self.base_url);
        let body = self.request_body(request);

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::internal)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!(
                "Ollama chat error ({}): {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::internal)?;
        message_text(&payload)
    }
}
