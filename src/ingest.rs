//! Batch ingestion of solved examples into the example store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::errors::RagError;
use crate::embedding::Embedder;
use crate::store::types::{DEFAULT_CATEGORY, DEFAULT_SUB_CATEGORY};
use crate::store::{EmbeddedExample, Example, ExampleMetadata, ExampleStore};

/// One raw triple as produced by the data-preparation step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExampleInput {
    pub requirement_text: String,
    pub solution_text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub received: usize,
    pub inserted: usize,
    pub skipped_empty: usize,
    /// Inputs that were not written because identical content already existed.
    pub duplicates: usize,
    /// True when the collection was non-empty and replacement was not requested.
    pub skipped_existing: bool,
    pub batches: usize,
}

pub struct Ingestor {
    store: Arc<dyn ExampleStore>,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(store: Arc<dyn ExampleStore>, embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        Self {
            store,
            embedder,
            batch_size: batch_size.max(1),
        }
    }

    /// Embeds and stores `inputs`.
    ///
    /// With `replace_all` the existing collection is swapped out atomically.
    /// Without it, a non-empty collection is left untouched and nothing is
    /// embedded; a failure part way through keeps the batches already stored.
    /// Inputs with blank requirement text are skipped and counted.
    pub async fn upsert_batch(
        &self,
        inputs: Vec<ExampleInput>,
        replace_all: bool,
    ) -> Result<IngestReport, RagError> {
        let mut report = IngestReport {
            received: inputs.len(),
            ..IngestReport::default()
        };

        if !replace_all {
            let existing = self.store.count().await?;
            if existing > 0 {
                tracing::info!(
                    "Example store already holds {} examples; skipping ingestion",
                    existing
                );
                report.skipped_existing = true;
                return Ok(report);
            }
        }

        let mut examples = Vec::with_capacity(inputs.len());
        for input in inputs {
            match prepare_example(input) {
                Some(example) => examples.push(example),
                None => report.skipped_empty += 1,
            }
        }

        // Each chunk is written as soon as it is embedded. A replacement
        // stays staged until every chunk is in and is discarded on error.
        let mut replacement = if replace_all {
            Some(self.store.begin_replace().await?)
        } else {
            None
        };

        for chunk in examples.chunks(self.batch_size) {
            let texts: Vec<String> = chunk
                .iter()
                .map(|example| example.requirement_text.clone())
                .collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != chunk.len() {
                return Err(RagError::Embedding(format!(
                    "expected {} embeddings, received {}",
                    chunk.len(),
                    vectors.len()
                )));
            }
            let batch: Vec<EmbeddedExample> = chunk
                .iter()
                .cloned()
                .zip(vectors)
                .map(|(example, embedding)| EmbeddedExample { example, embedding })
                .collect();

            let written = match replacement.as_mut() {
                Some(replacement) => replacement.write(batch).await?,
                None => self.store.insert_batch(batch).await?,
            };
            report.inserted += written;
            report.duplicates += chunk.len().saturating_sub(written);
            report.batches += 1;
            tracing::debug!(
                "Stored batch {} ({} embedded, {} new)",
                report.batches,
                chunk.len(),
                written
            );
        }

        if let Some(replacement) = replacement {
            replacement.commit().await?;
        }

        tracing::info!(
            "Ingested {} examples ({} empty skipped, {} duplicates, replace_all={})",
            report.inserted,
            report.skipped_empty,
            report.duplicates,
            replace_all
        );
        Ok(report)
    }
}

/// Cleans one raw triple and derives its metadata. `None` for blank requirements.
pub fn prepare_example(input: ExampleInput) -> Option<Example> {
    let requirement_text = clean_text(&input.requirement_text);
    if requirement_text.is_empty() {
        return None;
    }
    let solution_text = clean_text(&input.solution_text);

    let mut extra = input.metadata;
    let category = take_label(&mut extra, "category", DEFAULT_CATEGORY);
    let sub_category = take_label(&mut extra, "sub_category", DEFAULT_SUB_CATEGORY);
    let has_supporting_table = extra
        .get("supporting_table")
        .and_then(Value::as_str)
        .map(|text| !text.trim().is_empty())
        .unwrap_or(false);
    for derived in [
        "requirement_length",
        "solution_length",
        "has_supporting_table",
    ] {
        extra.remove(derived);
    }

    let metadata = ExampleMetadata {
        category,
        sub_category,
        requirement_length: requirement_text.chars().count(),
        solution_length: solution_text.chars().count(),
        has_supporting_table,
        extra,
    };

    Some(Example {
        id: Example::content_id(&requirement_text, &solution_text),
        requirement_text,
        solution_text,
        metadata,
    })
}

fn clean_text(text: &str) -> String {
    text.trim_start_matches('\u{feff}')
        .replace("\r\n", "\n")
        .trim()
        .to_string()
}

fn take_label(extra: &mut Map<String, Value>, key: &str, default: &str) -> String {
    match extra.remove(key) {
        Some(Value::String(label)) if !label.trim().is_empty() => label.trim().to_string(),
        _ => default.to_string(),
    }
}
