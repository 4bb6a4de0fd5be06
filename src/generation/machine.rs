//! Pure transition function of the generation loop.
//!
//! ```text
//! START -> GENERATE -> VALIDATE -> ACCEPT
//!             ^                 -> RETRY -> GENERATE
//!             |                 -> EXHAUSTED
//! ```

use super::types::ValidationVerdict;
use crate::prompt::correction_hint;

pub const MAX_RETRIES: u32 = 3;
pub const ACCEPTANCE_THRESHOLD: f32 = 0.7;

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// The generation call failed, timed out or produced an empty script.
    GenerationFailed,
    /// The comparator could not be reached or its reply could not be parsed. Scores 0.
    ComparatorFailed,
    Scored(ValidationVerdict),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Accept,
    Retry { hint: Option<String> },
    Exhausted,
}

/// Decides what follows attempt `attempt_index` (1-based).
pub fn decide(attempt_index: u32, outcome: &AttemptOutcome, previous_hint: Option<&str>) -> Transition {
    if let AttemptOutcome::Scored(verdict) = outcome {
        if verdict.comparator_score >= ACCEPTANCE_THRESHOLD {
            return Transition::Accept;
        }
    }

    if attempt_index >= MAX_RETRIES {
        return Transition::Exhausted;
    }

    let hint = match outcome {
        AttemptOutcome::Scored(verdict) => Some(scored_hint(verdict)),
        _ => previous_hint.map(str::to_string),
    };
    Transition::Retry { hint }
}

fn scored_hint(verdict: &ValidationVerdict) -> String {
    let hint = correction_hint(&verdict.differences);
    if hint.is_empty() {
        format!(
            "- The structure scored {:.2}; follow the reference step order more closely.",
            verdict.comparator_score
        )
    } else {
        hint
    }
}
