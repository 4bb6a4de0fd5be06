use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub const DEFAULT_CATEGORY: &str = "unknown";
pub const DEFAULT_SUB_CATEGORY: &str = "other";

/// Attributes stored next to every example vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExampleMetadata {
    pub category: String,
    pub sub_category: String,
    pub requirement_length: usize,
    pub solution_length: usize,
    pub has_supporting_table: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ExampleMetadata {
    fn default() -> Self {
        Self {
            category: DEFAULT_CATEGORY.to_string(),
            sub_category: DEFAULT_SUB_CATEGORY.to_string(),
            requirement_length: 0,
            solution_length: 0,
            has_supporting_table: false,
            extra: Map::new(),
        }
    }
}

impl ExampleMetadata {
    /// Looks up a metadata field by its serialized name.
    pub fn field(&self, key: &str) -> Option<Value> {
        match key {
            "category" => Some(Value::String(self.category.clone())),
            "sub_category" => Some(Value::String(self.sub_category.clone())),
            "requirement_length" => Some(Value::from(self.requirement_length)),
            "solution_length" => Some(Value::from(self.solution_length)),
            "has_supporting_table" => Some(Value::Bool(self.has_supporting_table)),
            other => self.extra.get(other).cloned(),
        }
    }
}

/// A solved (requirement, solution) pair. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub id: String,
    pub requirement_text: String,
    pub solution_text: String,
    pub metadata: ExampleMetadata,
}

impl Example {
    /// Content-addressed id: identical triples always collide.
    pub fn content_id(requirement_text: &str, solution_text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(requirement_text.as_bytes());
        hasher.update([0u8]);
        hasher.update(solution_text.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// An example together with the vector it is indexed under.
#[derive(Debug, Clone)]
pub struct EmbeddedExample {
    pub example: Example,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredExample {
    pub example: Example,
    /// Cosine similarity clamped to `[0, 1]`.
    pub similarity: f32,
}

/// Equality filter over metadata fields. Every entry must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataFilter(BTreeMap<String, Value>);

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, metadata: &ExampleMetadata) -> bool {
        self.0
            .iter()
            .all(|(key, expected)| metadata.field(key).as_ref() == Some(expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_id_is_stable_and_field_sensitive() {
        let a = Example::content_id("req", "sol");
        assert_eq!(a, Example::content_id("req", "sol"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, Example::content_id("reqs", "ol"));
    }

    #[test]
    fn filter_matches_known_and_extra_fields() {
        let mut metadata = ExampleMetadata {
            category: "postpaid".into(),
            ..ExampleMetadata::default()
        };
        metadata.extra.insert("region".into(), json!("north"));

        assert!(MetadataFilter::new().matches(&metadata));
        assert!(MetadataFilter::new()
            .with("category", "postpaid")
            .with("region", "north")
            .matches(&metadata));
        assert!(!MetadataFilter::new().with("category", "prepaid").matches(&metadata));
        assert!(!MetadataFilter::new().with("missing", "x").matches(&metadata));
    }

    #[test]
    fn metadata_round_trips_with_extra_keys_flattened() {
        let value = json!({
            "category": "dealer",
            "requirement_length": 12,
            "channel": "retail"
        });
        let metadata: ExampleMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(metadata.category, "dealer");
        assert_eq!(metadata.sub_category, DEFAULT_SUB_CATEGORY);
        assert_eq!(metadata.extra.get("channel"), Some(&json!("retail")));
    }
}
