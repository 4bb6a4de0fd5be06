use serde::{Deserialize, Serialize};

use crate::store::ScoredExample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityVerdict {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityVerdict {
    /// Rule table over mean similarity and high-confidence ratio.
    ///
    /// Rows are checked top to bottom and the first match wins.
    pub fn classify(total_results: usize, mean_similarity: f32, high_confidence_ratio: f32) -> Self {
        if total_results == 0 {
            QualityVerdict::Poor
        } else if mean_similarity >= 0.8 && high_confidence_ratio >= 0.6 {
            QualityVerdict::Excellent
        } else if mean_similarity >= 0.7 && high_confidence_ratio >= 0.4 {
            QualityVerdict::Good
        } else if mean_similarity >= 0.6 {
            QualityVerdict::Fair
        } else {
            QualityVerdict::Poor
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            QualityVerdict::Excellent => {
                "High-quality matches found. Generated script should be highly accurate."
            }
            QualityVerdict::Good => "Good matches found. Generated script should be reliable.",
            QualityVerdict::Fair => {
                "Moderate matches found. Review the generated script carefully."
            }
            QualityVerdict::Poor => {
                "Few relevant matches found. Consider adding more similar examples to the store."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAnalysis {
    pub verdict: QualityVerdict,
    pub mean_similarity: f32,
    pub high_confidence_ratio: f32,
    pub total_results: usize,
    pub high_confidence_count: usize,
    pub recommendation: String,
}

/// Scores a result set against `confidence_threshold`. Pure; never cached.
pub fn analyze_quality(results: &[ScoredExample], confidence_threshold: f32) -> QualityAnalysis {
    let total_results = results.len();
    let high_confidence_count = results
        .iter()
        .filter(|result| result.similarity >= confidence_threshold)
        .count();

    let (mean_similarity, high_confidence_ratio) = if total_results == 0 {
        (0.0, 0.0)
    } else {
        let sum: f32 = results.iter().map(|result| result.similarity).sum();
        (
            sum / total_results as f32,
            high_confidence_count as f32 / total_results as f32,
        )
    };

    let verdict = QualityVerdict::classify(total_results, mean_similarity, high_confidence_ratio);
    QualityAnalysis {
        verdict,
        mean_similarity,
        high_confidence_ratio,
        total_results,
        high_confidence_count,
        recommendation: verdict.recommendation().to_string(),
    }
}
