//! Free-form target table descriptions.
//!
//! Accepted layout:
//!
//! ```text
//! AGENT_PAYOUT:
//! MSISDN, VARCHAR2(20), Agent number
//! AMOUNT, NUMBER
//! REMARKS
//! ```

use serde::{Deserialize, Serialize};

pub const DEFAULT_COLUMN_TYPE: &str = "VARCHAR2(100)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

/// Parses `NAME:` blocks followed by `COLUMN, TYPE[, description]` lines.
///
/// Comment lines (`#`, `--`) are ignored and tables without columns are dropped.
pub fn parse_target_tables(text: &str) -> Vec<TableSchema> {
    let mut tables: Vec<TableSchema> = Vec::new();
    let mut current: Option<TableSchema> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("--") {
            continue;
        }

        if let Some(name) = table_header(line) {
            if let Some(table) = current.take() {
                tables.push(table);
            }
            current = Some(TableSchema {
                name,
                columns: Vec::new(),
            });
            continue;
        }

        if let Some(table) = current.as_mut() {
            if let Some(column) = parse_column(line) {
                table.columns.push(column);
            }
        }
    }

    if let Some(table) = current.take() {
        tables.push(table);
    }
    tables.retain(|table| !table.columns.is_empty());
    tables
}

fn table_header(line: &str) -> Option<String> {
    let name = line.strip_suffix(':')?.trim();
    let mut chars = name.chars();
    let first = chars.next()?;
    let valid = (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    valid.then(|| name.to_ascii_uppercase())
}

fn parse_column(line: &str) -> Option<ColumnSpec> {
    let line = line.strip_suffix(',').unwrap_or(line).trim();
    if line.is_empty() || line.starts_with('-') {
        return None;
    }

    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    let name = parts.first().filter(|p| !p.is_empty())?.to_ascii_uppercase();
    let data_type = match parts.get(1) {
        Some(kind) if !kind.is_empty() => kind.to_string(),
        Some(_) => return None,
        None => DEFAULT_COLUMN_TYPE.to_string(),
    };
    let description = parts
        .get(2..)
        .map(|rest| rest.join(", "))
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| title_case(&name));

    Some(ColumnSpec {
        name,
        data_type,
        description,
    })
}

fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let lower = part.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compact listing of the parsed tables, or the trimmed raw text when nothing parses.
pub fn render_target_hint(text: &str) -> String {
    let tables = parse_target_tables(text);
    if tables.is_empty() {
        return text.trim().to_string();
    }

    tables
        .iter()
        .map(|table| {
            let columns = table
                .columns
                .iter()
                .map(|column| {
                    format!(
                        "  - {} {} ({})",
                        column.name, column.data_type, column.description
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            format!("{}:\n{}", table.name, columns)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
