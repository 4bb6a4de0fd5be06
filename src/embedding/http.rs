//! OpenAI-compatible `/v1/embeddings` client.
//!
//! Works against OpenAI itself and against local servers exposing the same
//! surface (LM Studio, Ollama's compatibility layer, llama.cpp server).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::provider::Embedder;
use crate::core::errors::RagError;

#[derive(Clone)]
pub struct HttpEmbedder {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(
        base_url: String,
        model: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RagError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| RagError::Embedding(err.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            client,
        })
    }

    fn order_vectors(
        response: EmbeddingsResponse,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>, RagError> {
        if response.data.len() != expected {
            return Err(RagError::Embedding(format!(
                "expected {} embeddings, received {}",
                expected,
                response.data.len()
            )));
        }

        let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
        for (position, item) in response.data.into_iter().enumerate() {
            let index = item.index.unwrap_or(position);
            let slot = slots.get_mut(index).ok_or_else(|| {
                RagError::Embedding(format!("embedding index {} out of range", index))
            })?;
            *slot = Some(item.embedding);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| RagError::Embedding(format!("missing embedding {}", index)))
            })
            .collect()
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": inputs,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request
            .send()
            .await
            .map_err(|err| RagError::Embedding(err.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!(
                "embedding request failed with {}: {}",
                status, text
            )));
        }

        let payload: EmbeddingsResponse = res
            .json()
            .await
            .map_err(|err| RagError::Embedding(err.to_string()))?;

        Self::order_vectors(payload, inputs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(items: Vec<(Option<usize>, Vec<f32>)>) -> EmbeddingsResponse {
        EmbeddingsResponse {
            data: items
                .into_iter()
                .map(|(index, embedding)| EmbeddingItem { index, embedding })
                .collect(),
        }
    }

    #[test]
    fn vectors_are_reordered_by_index() {
        let ordered = HttpEmbedder::order_vectors(
            response(vec![(Some(1), vec![2.0]), (Some(0), vec![1.0])]),
            2,
        )
        .unwrap();
        assert_eq!(ordered, vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn missing_index_falls_back_to_position() {
        let ordered =
            HttpEmbedder::order_vectors(response(vec![(None, vec![1.0]), (None, vec![2.0])]), 2)
                .unwrap();
        assert_eq!(ordered[1], vec![2.0]);
    }

    #[test]
    fn count_mismatch_is_an_error() {
        let err = HttpEmbedder::order_vectors(response(vec![(Some(0), vec![1.0])]), 2).unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));

        let err = HttpEmbedder::order_vectors(
            response(vec![(Some(0), vec![1.0]), (Some(0), vec![2.0])]),
            2,
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing embedding 1"));
    }

    #[test]
    fn payload_parses_openai_shape() {
        let payload: EmbeddingsResponse = serde_json::from_str(
            r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.1,0.2]}],"model":"m"}"#,
        )
        .unwrap();
        assert_eq!(payload.data[0].embedding.len(), 2);
    }
}
