use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Cheap structural sanity check of a generated script.
///
/// Informational only: it never changes whether a script is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptLint {
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
}

fn word(keyword: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b{}\b", keyword))
        .unwrap_or_else(|err| panic!("invalid lint pattern {keyword}: {err}"))
}

struct LintPatterns {
    select: Regex,
    from: Regex,
    where_clause: Regex,
}

fn lint_patterns() -> &'static LintPatterns {
    static PATTERNS: OnceLock<LintPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| LintPatterns {
        select: word("SELECT"),
        from: word("FROM"),
        where_clause: word("WHERE"),
    })
}

pub fn lint_script(text: &str) -> ScriptLint {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();
    let trimmed = text.trim();

    if trimmed.is_empty() {
        issues.push("Script is empty".to_string());
        return ScriptLint {
            is_valid: false,
            issues,
            warnings,
        };
    }

    let patterns = lint_patterns();
    if !patterns.select.is_match(trimmed) {
        issues.push("Missing SELECT statement".to_string());
    }
    if !patterns.from.is_match(trimmed) {
        issues.push("Missing FROM clause".to_string());
    }
    if !trimmed.contains(';') {
        warnings.push("Missing statement terminator ';'".to_string());
    }
    if !patterns.where_clause.is_match(trimmed) {
        warnings.push("No WHERE clause found".to_string());
    }

    ScriptLint {
        is_valid: issues.is_empty(),
        issues,
        warnings,
    }
}
