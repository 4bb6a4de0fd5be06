//! Cleanup applied to raw model replies before they are validated or returned.

use std::sync::OnceLock;

use regex::Regex;

fn reasoning_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<think>.*?</think>\s*|<thinking>.*?</thinking>\s*")
            .unwrap_or_else(|err| panic!("invalid reasoning pattern: {err}"))
    })
}

fn fenced_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n(.*?)```")
            .unwrap_or_else(|err| panic!("invalid fence pattern: {err}"))
    })
}

fn annotation_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)--#.*?--#").unwrap_or_else(|err| panic!("invalid annotation pattern: {err}"))
    })
}

/// Removes `<think>` / `<thinking>` sections emitted by reasoning models.
///
/// An unterminated opening tag drops everything after it.
pub fn strip_reasoning_blocks(text: &str) -> String {
    let stripped = reasoning_block().replace_all(text, "");
    let lower = stripped.to_ascii_lowercase();
    match lower.find("<think") {
        Some(idx) => stripped[..idx].to_string(),
        None => stripped.into_owned(),
    }
}

/// Unwraps a markdown code fence.
///
/// A reply that starts with a fence loses its opening and closing fence lines.
/// A reply with prose around a fenced block is reduced to the first block.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with("```") {
        let mut lines: Vec<&str> = trimmed.lines().collect();
        lines.remove(0);
        if lines.last().map(|line| line.trim() == "```").unwrap_or(false) {
            lines.pop();
        }
        return lines.join("\n").trim().to_string();
    }

    if let Some(caps) = fenced_block().captures(trimmed) {
        return caps[1].trim().to_string();
    }

    trimmed.to_string()
}

/// Removes `--# ... --#` annotation blocks that must not reach the final script.
pub fn strip_annotation_blocks(text: &str) -> String {
    annotation_block().replace_all(text, "").trim().to_string()
}

/// Full cleanup for generated scripts.
pub fn clean_generated_script(raw: &str) -> String {
    let without_reasoning = strip_reasoning_blocks(raw);
    let unfenced = strip_code_fences(&without_reasoning);
    strip_annotation_blocks(&unfenced)
}
