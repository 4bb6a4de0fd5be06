use chrono::{Datelike, Local, NaiveDate};

pub const PUBLISH_CYCLE_TOKEN: &str = "PUBLISH_CYCLE";

pub const GENERATION_SYSTEM_PROMPT: &str = "You are an expert Oracle SQL developer. \
You write SQL scripts for new business requirements by adapting a reference script that solved a similar requirement.

Rules:
1. Follow the reference script's structure and step sequence exactly: same operations, same order.
2. Use only the tables, values, dates and thresholds stated in the new requirement. Never copy literal values from the reference.
3. Keep explanatory `--` comments in the output. Remove every `--#` annotation block.
4. Output the SQL script only. No markdown, no code fences, no explanations.";

pub const COMPARATOR_SYSTEM_PROMPT: &str = "You are an expert SQL structure comparator. \
Compare the flow and order of operations in two SQL scripts: SELECT, JOIN, WHERE, GROUP BY, ORDER BY, CREATE TABLE, INSERT, MERGE, UPDATE, DELETE and EXEC steps.

Ignore table names, column names, literal values, report names and comments. Only the structural flow matters.

Respond with JSON only, in this exact shape:
{\"comparator_score\": <number between 0.0 and 1.0>, \"differences\": [\"<structural difference>\", ...]}

If the flow is identical, return an empty differences list and a score of 1.0.";

/// Month token substituted for `PUBLISH_CYCLE`, e.g. `Jul_25`.
pub fn publish_cycle<D: Datelike>(date: &D) -> String {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
        .map(|first| first.format("%b_%y").to_string())
        .unwrap_or_default()
}

pub fn current_publish_cycle() -> String {
    publish_cycle(&Local::now().date_naive())
}

/// User message for one generation attempt.
///
/// `correction_hint` carries the previous attempt's structural differences.
pub fn generation_prompt(
    formatted_context: &str,
    correction_hint: Option<&str>,
    publish_cycle: &str,
) -> String {
    let mut prompt = format!("Replace {} with {}.", PUBLISH_CYCLE_TOKEN, publish_cycle);

    if let Some(hint) = correction_hint.map(str::trim).filter(|hint| !hint.is_empty()) {
        prompt.push_str("\nIn the previous attempt, the script had these structural issues:\n");
        prompt.push_str(hint);
        prompt.push_str("\nPlease fix them.");
    }

    prompt.push_str("\n\nCONTEXT:\n");
    prompt.push_str(formatted_context);
    prompt.push_str("\n\nGenerated SQL script for the new requirement:");
    prompt
}

pub fn comparator_user_message(reference: &str, candidate: &str) -> String {
    format!(
        "<Reference SQL>\n{}\n</Reference SQL>\n\n<Generated SQL>\n{}\n</Generated SQL>",
        reference.trim(),
        candidate.trim()
    )
}

/// Bullet list of differences used as the next attempt's correction hint.
pub fn correction_hint(differences: &[String]) -> String {
    differences
        .iter()
        .map(|difference| difference.trim())
        .filter(|difference| !difference.is_empty())
        .map(|difference| format!("- {}", difference))
        .collect::<Vec<_>>()
        .join("\n")
}
