use std::sync::Arc;

use super::context::RetrievalContext;
use crate::core::config::settings::RagSettings;
use crate::embedding::Embedder;
use crate::store::{ExampleStore, MetadataFilter};

#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    pub max_results: usize,
    pub confidence_threshold: f32,
    pub filter_fallback: bool,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self::from(&RagSettings::default())
    }
}

impl From<&RagSettings> for RetrieverConfig {
    fn from(settings: &RagSettings) -> Self {
        Self {
            max_results: settings.max_results.max(1),
            confidence_threshold: settings.confidence_threshold,
            filter_fallback: settings.filter_fallback,
        }
    }
}

/// Embeds a requirement, searches the store and partitions the matches.
pub struct Retriever {
    store: Arc<dyn ExampleStore>,
    embedder: Arc<dyn Embedder>,
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn ExampleStore>,
        embedder: Arc<dyn Embedder>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Never fails: store and embedding outages degrade to an empty context
    /// with `retrieval_error` set. `max_results == 0` means the configured default.
    pub async fn retrieve(
        &self,
        query_text: &str,
        max_results: usize,
        filter: Option<&MetadataFilter>,
    ) -> RetrievalContext {
        let threshold = self.config.confidence_threshold;
        let k = if max_results == 0 {
            self.config.max_results
        } else {
            max_results
        };
        let filter = filter.filter(|f| !f.is_empty());

        let query_embedding = match self.embedder.embed_one(query_text).await {
            Ok(vector) => vector,
            Err(err) => {
                tracing::error!("Query embedding failed, continuing without examples: {}", err);
                return RetrievalContext::degraded(query_text, threshold, err.to_string());
            }
        };

        let mut filter_applied = filter.is_some();
        let mut results = match self.store.search(&query_embedding, k, filter).await {
            Ok(results) => results,
            Err(err) => {
                tracing::error!("Example search failed, continuing without examples: {}", err);
                return RetrievalContext::degraded(query_text, threshold, err.to_string());
            }
        };

        if results.is_empty() && filter_applied && self.config.filter_fallback {
            tracing::warn!("No examples matched the metadata filter; retrying unfiltered");
            filter_applied = false;
            results = match self.store.search(&query_embedding, k, None).await {
                Ok(results) => results,
                Err(err) => {
                    tracing::error!("Unfiltered example search failed: {}", err);
                    return RetrievalContext::degraded(query_text, threshold, err.to_string());
                }
            };
        }

        let context = RetrievalContext::new(query_text, results, threshold, filter_applied);
        let quality = context.analyze_quality();
        tracing::info!(
            "Retrieved {} examples ({} high-confidence, quality {:?}, mean {:.3})",
            context.all_results().len(),
            context.high_confidence_results().len(),
            quality.verdict,
            quality.mean_similarity
        );
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::core::errors::RagError;
    use crate::retrieval::QualityVerdict;
    use crate::store::{
        EmbeddedExample, Example, ExampleMetadata, MemoryExampleStore, Replacement,
        ScoredExample,
    };

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn model_id(&self) -> &str {
            "fixed"
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            Ok(inputs.iter().map(|_| self.0.clone()).collect())
        }
    }

    struct OfflineStore;

    #[async_trait]
    impl ExampleStore for OfflineStore {
        fn backend_name(&self) -> &str {
            "offline"
        }
        async fn insert_batch(&self, _: Vec<EmbeddedExample>) -> Result<usize, RagError> {
            Err(RagError::store("offline"))
        }
        async fn begin_replace<'a>(&'a self) -> Result<Box<dyn Replacement + 'a>, RagError> {
            Err(RagError::store("offline"))
        }
        async fn search(
            &self,
            _: &[f32],
            _: usize,
            _: Option<&MetadataFilter>,
        ) -> Result<Vec<ScoredExample>, RagError> {
            Err(RagError::store("index unreachable"))
        }
        async fn get(&self, _: &str) -> Result<Option<Example>, RagError> {
            Err(RagError::store("offline"))
        }
        async fn delete(&self, _: &str) -> Result<bool, RagError> {
            Err(RagError::store("offline"))
        }
        async fn count(&self) -> Result<usize, RagError> {
            Err(RagError::store("offline"))
        }
        async fn clear(&self) -> Result<usize, RagError> {
            Err(RagError::store("offline"))
        }
    }

    fn embedded(id: &str, category: &str, embedding: Vec<f32>) -> EmbeddedExample {
        EmbeddedExample {
            example: Example {
                id: id.to_string(),
                requirement_text: format!("req {id}"),
                solution_text: format!("SELECT {id} FROM t;"),
                metadata: ExampleMetadata {
                    category: category.to_string(),
                    ..ExampleMetadata::default()
                },
            },
            embedding,
        }
    }

    async fn seeded_store() -> Arc<MemoryExampleStore> {
        let store = Arc::new(MemoryExampleStore::new());
        store
            .insert_batch(vec![
                embedded("exact", "dealer", vec![1.0, 0.0]),
                embedded("close", "retail", vec![0.8, 0.6]),
                embedded("far", "retail", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        store
    }

    fn config(filter_fallback: bool) -> RetrieverConfig {
        RetrieverConfig {
            max_results: 5,
            confidence_threshold: 0.7,
            filter_fallback,
        }
    }

    #[tokio::test]
    async fn empty_store_yields_poor_empty_context() {
        let retriever = Retriever::new(
            Arc::new(MemoryExampleStore::new()),
            Arc::new(FixedEmbedder(vec![1.0, 0.0])),
            config(false),
        );
        let context = retriever.retrieve("anything", 5, None).await;
        assert!(context.all_results().is_empty());
        assert_eq!(context.analyze_quality().verdict, QualityVerdict::Poor);
        assert!(context.retrieval_error().is_none());
    }

    #[tokio::test]
    async fn partitions_by_threshold() {
        let retriever = Retriever::new(
            seeded_store().await,
            Arc::new(FixedEmbedder(vec![1.0, 0.0])),
            config(false),
        );
        let context = retriever.retrieve("q", 0, None).await;
        assert_eq!(context.all_results().len(), 3);
        let high: Vec<&str> = context
            .high_confidence_results()
            .iter()
            .map(|r| r.example.id.as_str())
            .collect();
        assert_eq!(high, vec!["exact", "close"]);
    }

    #[tokio::test]
    async fn store_outage_degrades_to_empty() {
        let retriever = Retriever::new(
            Arc::new(OfflineStore),
            Arc::new(FixedEmbedder(vec![1.0])),
            config(false),
        );
        let context = retriever.retrieve("q", 3, None).await;
        assert!(context.all_results().is_empty());
        assert!(context
            .retrieval_error()
            .unwrap_or_default()
            .contains("index unreachable"));
    }

    #[tokio::test]
    async fn strict_filter_does_not_fall_back() {
        let retriever = Retriever::new(
            seeded_store().await,
            Arc::new(FixedEmbedder(vec![1.0, 0.0])),
            config(false),
        );
        let filter = MetadataFilter::new().with("category", "prepaid");
        let context = retriever.retrieve("q", 5, Some(&filter)).await;
        assert!(context.all_results().is_empty());
        assert!(context.filter_applied());
    }

    #[tokio::test]
    async fn fallback_searches_unfiltered_when_enabled() {
        let retriever = Retriever::new(
            seeded_store().await,
            Arc::new(FixedEmbedder(vec![1.0, 0.0])),
            config(true),
        );
        let filter = MetadataFilter::new().with("category", "prepaid");
        let context = retriever.retrieve("q", 5, Some(&filter)).await;
        assert_eq!(context.all_results().len(), 3);
        assert!(!context.filter_applied());

        let retail = MetadataFilter::new().with("category", "retail");
        let context = retriever.retrieve("q", 1, Some(&retail)).await;
        assert_eq!(context.all_results()[0].example.id, "close");
        assert!(context.filter_applied());
    }
}
