//! Local feature-hashing embedder.
//!
//! Produces deterministic dense vectors by hashing terms into fixed-dimension
//! buckets weighted by term frequency. Needs no network and no model files.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::provider::Embedder;
use crate::core::errors::RagError;

pub struct HashingEmbedder {
    dimensions: usize,
    model_id: String,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            dimensions,
            model_id: format!("hashing-{}", dimensions),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// FNV-1a bucket for a term.
    fn bucket(term: &str, dims: usize) -> usize {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in term.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        (h % dims as u64) as usize
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|s| s.chars().count() >= 2)
            .map(|s| s.to_lowercase())
            .collect()
    }

    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let tokens = Self::tokenize(text);
        let mut vector = vec![0.0f32; self.dimensions];
        if tokens.is_empty() {
            return vector;
        }

        let mut tf: BTreeMap<&str, f32> = BTreeMap::new();
        for token in &tokens {
            *tf.entry(token.as_str()).or_default() += 1.0;
        }

        let total = tokens.len() as f32;
        for (term, count) in tf {
            // Longer terms carry more signal than short connective words.
            let weight = 1.0 + (term.len() as f32).ln();
            vector[Self::bucket(term, self.dimensions)] += (count / total) * weight;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(inputs.iter().map(|text| self.vectorize(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::similarity::cosine_similarity;

    #[test]
    fn empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(64);
        let v = embedder.vectorize("");
        assert_eq!(v.len(), 64);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn output_is_unit_length_and_deterministic() {
        let embedder = HashingEmbedder::new(256);
        let a = embedder.vectorize("monthly dealer commission with slab targets");
        let b = embedder.vectorize("monthly dealer commission with slab targets");
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert_eq!(a, b);
    }

    #[test]
    fn related_texts_score_higher_than_unrelated() {
        let embedder = HashingEmbedder::new(384);
        let query = embedder.vectorize("dealer commission payout for prepaid recharge");
        let close = embedder.vectorize("prepaid recharge dealer commission payout");
        let far = embedder.vectorize("quarterly network outage report");
        assert!(cosine_similarity(&query, &close) > cosine_similarity(&query, &far));
    }

    #[tokio::test]
    async fn embed_preserves_input_order() {
        let embedder = HashingEmbedder::new(32);
        let inputs = vec!["alpha beta".to_string(), "gamma delta".to_string()];
        let vectors = embedder.embed(&inputs).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1], embedder.vectorize("gamma delta"));
        assert_eq!(embedder.embed_one("alpha beta").await.unwrap(), vectors[0]);
    }
}
