use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::RagError;
use crate::text::filters::strip_code_fences;

/// Input to one run of the generation loop.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub formatted_context: String,
    /// Solution text of the reference example every attempt is validated against.
    pub reference_solution: String,
    pub publish_cycle: String,
}

/// Record of one generate/validate pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationAttempt {
    pub attempt_index: u32,
    pub prompt: String,
    pub raw_response: Option<String>,
    pub generated_text: String,
    pub normalized_response: String,
    pub comparator_score: f32,
    pub differences: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub comparator_score: f32,
    pub differences: Vec<String>,
}

const SCORE_KEYS: [&str; 3] = ["comparator_score", "confident_score", "score"];

impl ValidationVerdict {
    pub fn new(comparator_score: f32, differences: Vec<String>) -> Self {
        Self {
            comparator_score: comparator_score.clamp(0.0, 1.0),
            differences,
        }
    }

    /// Parses a comparator reply.
    ///
    /// Tolerates code fences and prose around the JSON object, the legacy
    /// `confident_score` key and `differences` given as a single string.
    pub fn parse(raw: &str) -> Result<Self, RagError> {
        let unfenced = strip_code_fences(raw);
        let start = unfenced.find('{');
        let end = unfenced.rfind('}');
        let body = match (start, end) {
            (Some(start), Some(end)) if start < end => &unfenced[start..=end],
            _ => {
                return Err(RagError::ComparatorParse(format!(
                    "no JSON object in reply: {}",
                    preview(raw)
                )))
            }
        };

        let value: Value = serde_json::from_str(body)
            .map_err(|err| RagError::ComparatorParse(format!("{}: {}", err, preview(raw))))?;

        let score = SCORE_KEYS
            .iter()
            .find_map(|key| value.get(*key))
            .ok_or_else(|| RagError::ComparatorParse("reply has no score field".to_string()))
            .and_then(score_value)?;

        let differences = match value.get("differences") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(text)) if text.trim().is_empty() => Vec::new(),
            Some(Value::String(text)) => vec![text.trim().to_string()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(text) => Some(text.trim().to_string()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .filter(|text| !text.is_empty())
                .collect(),
            Some(other) => {
                return Err(RagError::ComparatorParse(format!(
                    "differences has unexpected type: {}",
                    other
                )))
            }
        };

        Ok(Self::new(score as f32, differences))
    }
}

fn score_value(value: &Value) -> Result<f64, RagError> {
    let score = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| RagError::ComparatorParse(format!("score is not a number: {}", value)))?;

    if !score.is_finite() {
        return Err(RagError::ComparatorParse(format!(
            "score is not finite: {}",
            score
        )));
    }
    Ok(score)
}

fn preview(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.char_indices().nth(120) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

/// Successful loop outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedScript {
    pub generated_text: String,
    pub comparator_score: f32,
    pub differences: Vec<String>,
    pub attempts_used: u32,
    pub attempts: Vec<GenerationAttempt>,
}

/// Carried by `RagError::RetriesExhausted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExhaustedReport {
    pub attempts_used: u32,
    pub last_attempt: GenerationAttempt,
    pub attempts: Vec<GenerationAttempt>,
}

impl ExhaustedReport {
    /// Most recent attempt that produced a script, even if a later one failed.
    pub fn best_effort(&self) -> Option<&GenerationAttempt> {
        self.attempts
            .iter()
            .rev()
            .find(|attempt| !attempt.generated_text.is_empty())
    }
}
