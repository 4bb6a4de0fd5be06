use serde::{Deserialize, Serialize};

use super::quality::{analyze_quality, QualityAnalysis};
use crate::store::ScoredExample;

/// Per-request retrieval outcome.
///
/// Fields are private so the high-confidence partition can only be built by
/// [`RetrievalContext::new`], which keeps it a subset of `all_results`.
#[derive(Debug, Clone)]
pub struct RetrievalContext {
    query_text: String,
    all_results: Vec<ScoredExample>,
    high_confidence_results: Vec<ScoredExample>,
    confidence_threshold: f32,
    filter_applied: bool,
    retrieval_error: Option<String>,
}

impl RetrievalContext {
    pub fn new(
        query_text: impl Into<String>,
        all_results: Vec<ScoredExample>,
        confidence_threshold: f32,
        filter_applied: bool,
    ) -> Self {
        let high_confidence_results = all_results
            .iter()
            .filter(|result| result.similarity >= confidence_threshold)
            .cloned()
            .collect();

        Self {
            query_text: query_text.into(),
            all_results,
            high_confidence_results,
            confidence_threshold,
            filter_applied,
            retrieval_error: None,
        }
    }

    /// Empty context recorded when the store or embedder could not be reached.
    pub fn degraded(
        query_text: impl Into<String>,
        confidence_threshold: f32,
        error: impl Into<String>,
    ) -> Self {
        let mut context = Self::new(query_text, Vec::new(), confidence_threshold, false);
        context.retrieval_error = Some(error.into());
        context
    }

    pub fn query_text(&self) -> &str {
        &self.query_text
    }

    pub fn all_results(&self) -> &[ScoredExample] {
        &self.all_results
    }

    pub fn high_confidence_results(&self) -> &[ScoredExample] {
        &self.high_confidence_results
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn filter_applied(&self) -> bool {
        self.filter_applied
    }

    pub fn retrieval_error(&self) -> Option<&str> {
        self.retrieval_error.as_deref()
    }

    /// The single example used as reference: the best high-confidence match.
    pub fn reference(&self) -> Option<&ScoredExample> {
        self.high_confidence_results.first()
    }

    pub fn best_similarity(&self) -> f32 {
        self.all_results
            .first()
            .map(|result| result.similarity)
            .unwrap_or(0.0)
    }

    pub fn analyze_quality(&self) -> QualityAnalysis {
        analyze_quality(&self.all_results, self.confidence_threshold)
    }

    pub fn summary(&self) -> RetrievalSummary {
        RetrievalSummary {
            quality: self.analyze_quality(),
            confidence_threshold: self.confidence_threshold,
            reference_id: self.reference().map(|r| r.example.id.clone()),
            reference_similarity: self.reference().map(|r| r.similarity),
            filter_applied: self.filter_applied,
            retrieval_error: self.retrieval_error.clone(),
            matches: self
                .all_results
                .iter()
                .map(|result| MatchSummary {
                    example_id: result.example.id.clone(),
                    similarity: result.similarity,
                    category: result.example.metadata.category.clone(),
                    sub_category: result.example.metadata.sub_category.clone(),
                    high_confidence: result.similarity >= self.confidence_threshold,
                })
                .collect(),
        }
    }
}

/// Serializable digest of a [`RetrievalContext`] for API responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalSummary {
    pub quality: QualityAnalysis,
    pub confidence_threshold: f32,
    pub reference_id: Option<String>,
    pub reference_similarity: Option<f32>,
    pub filter_applied: bool,
    pub retrieval_error: Option<String>,
    pub matches: Vec<MatchSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub example_id: String,
    pub similarity: f32,
    pub category: String,
    pub sub_category: String,
    pub high_confidence: bool,
}
