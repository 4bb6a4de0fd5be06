//! Exact cosine ranking shared by the store backends.

use std::cmp::Ordering;

use super::types::{Example, MetadataFilter, ScoredExample};

/// Cosine similarity mapped onto `[0, 1]`.
///
/// Mismatched or degenerate vectors score 0; negative cosines clamp to 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        return 0.0;
    }
    let score = dot / denom;
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Filters, scores and keeps the best `k` candidates.
///
/// `candidates` must be yielded in insertion order: the sort is stable, so
/// equal scores keep that order. The filter runs before the cut-off so `k`
/// counts matching entries only. Vectors whose dimension differs from the
/// query are skipped.
pub fn rank_candidates<'a, I>(
    query: &[f32],
    candidates: I,
    k: usize,
    filter: Option<&MetadataFilter>,
) -> Vec<ScoredExample>
where
    I: IntoIterator<Item = (&'a Example, &'a [f32])>,
{
    if k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<ScoredExample> = candidates
        .into_iter()
        .filter(|(example, _)| filter.map_or(true, |f| f.matches(&example.metadata)))
        .filter(|(_, embedding)| embedding.len() == query.len())
        .map(|(example, embedding)| ScoredExample {
            example: example.clone(),
            similarity: cosine_similarity(query, embedding),
        })
        .collect();

    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
    });
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::ExampleMetadata;

    fn example(id: &str, category: &str) -> Example {
        Example {
            id: id.to_string(),
            requirement_text: format!("req {id}"),
            solution_text: format!("sol {id}"),
            metadata: ExampleMetadata {
                category: category.to_string(),
                ..ExampleMetadata::default()
            },
        }
    }

    #[test]
    fn cosine_is_clamped_to_unit_interval() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn filter_runs_before_top_k() {
        let near = example("near", "a");
        let mid = example("mid", "b");
        let far = example("far", "b");
        let vectors: Vec<(Example, Vec<f32>)> = vec![
            (near, vec![1.0, 0.0]),
            (mid, vec![0.8, 0.6]),
            (far, vec![0.6, 0.8]),
        ];
        let filter = MetadataFilter::new().with("category", "b");

        let ranked = rank_candidates(
            &[1.0, 0.0],
            vectors.iter().map(|(e, v)| (e, v.as_slice())),
            2,
            Some(&filter),
        );

        let ids: Vec<&str> = ranked.iter().map(|r| r.example.id.as_str()).collect();
        assert_eq!(ids, vec!["mid", "far"]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let vectors: Vec<(Example, Vec<f32>)> = ["first", "second", "third"]
            .iter()
            .map(|id| (example(id, "a"), vec![0.5, 0.5]))
            .collect();

        let ranked = rank_candidates(
            &[1.0, 1.0],
            vectors.iter().map(|(e, v)| (e, v.as_slice())),
            3,
            None,
        );

        let ids: Vec<&str> = ranked.iter().map(|r| r.example.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn mismatched_dimensions_are_skipped() {
        let vectors: Vec<(Example, Vec<f32>)> = vec![
            (example("ok", "a"), vec![1.0, 0.0]),
            (example("bad", "a"), vec![1.0, 0.0, 0.0]),
        ];
        let ranked = rank_candidates(
            &[1.0, 0.0],
            vectors.iter().map(|(e, v)| (e, v.as_slice())),
            5,
            None,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].example.id, "ok");
    }
}
