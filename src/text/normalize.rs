//! Structural canonicalization of SQL-like scripts.
//!
//! The output keeps the order of recognized keywords and the arity of the
//! identifier lists that follow them, and nothing else. It is only ever used
//! for comparison; callers always receive the original script.

use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Placeholder emitted for every quoted, numeric and date-like literal.
pub const LITERAL_PLACEHOLDER: &str = "?";
/// Placeholder emitted for every identifier that follows a structural keyword.
pub const IDENTIFIER_PLACEHOLDER: &str = "NAME";

const SENTINEL_OPEN: char = '\u{1}';
const SENTINEL_CLOSE: char = '\u{2}';

const KEYWORDS: [&str; 32] = [
    "WHEN NOT MATCHED THEN INSERT",
    "WHEN MATCHED THEN UPDATE",
    "TRUNCATE TABLE",
    "CREATE TABLE",
    "ALTER TABLE",
    "DROP TABLE",
    "INSERT INTO",
    "DELETE FROM",
    "MERGE INTO",
    "INNER JOIN",
    "RIGHT JOIN",
    "LEFT JOIN",
    "FULL JOIN",
    "UNION ALL",
    "GROUP BY",
    "ORDER BY",
    "HAVING",
    "SELECT",
    "UPDATE",
    "VALUES",
    "COMMIT",
    "WHERE",
    "UNION",
    "USING",
    "FROM",
    "JOIN",
    "INTO",
    "EXEC",
    "WITH",
    "SET",
    "ON",
    "AS",
];

struct Patterns {
    whitespace: Regex,
    quoted: Regex,
    date: Regex,
    number: Regex,
    keyword: Regex,
    identifier_list: Regex,
    identifier: Regex,
    sentinel: Regex,
    keywords: Vec<&'static str>,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let mut keywords: Vec<&'static str> = KEYWORDS.to_vec();
        // Alternation is leftmost-first, so longer phrases must come first.
        keywords.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let alternation = keywords
            .iter()
            .map(|kw| {
                kw.split(' ')
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+")
            })
            .collect::<Vec<_>>()
            .join("|");

        // A segment runs on through word characters and closed quotes, so
        // `"Sales"s` is one name and nothing glued to it survives as text.
        let segment = r#"(?:"[^"\x01\x02]*"|[A-Za-z_])(?:[A-Za-z0-9_$#]|"[^"\x01\x02]*")*"#;
        let ident = format!(r"{segment}(?:\.{segment})*");

        Patterns {
            whitespace: compile(r"\s+"),
            quoted: compile(r"'(?:[^']|'')*'"),
            date: compile(r"\b(?:\d{1,2}-[A-Za-z]{3}-\d{2,4}|\d{4}-\d{2}-\d{2})\b"),
            number: compile(r"\b\d+(?:\.\d+)?\b"),
            keyword: compile(&format!(r"(?i)\b(?:{})\b", alternation)),
            identifier_list: compile(&format!(
                r"(\x01\d+\x02\s+)({ident}(?:\s*,\s*{ident})*)",
                ident = ident
            )),
            identifier: compile(&ident),
            sentinel: compile(r"\x01(\d+)\x02"),
            keywords,
        }
    })
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| panic!("invalid built-in pattern {pattern}: {err}"))
}

/// Canonicalizes `text` so that two scripts with the same statement structure
/// produce the same string.
///
/// `normalize(&normalize(x)) == normalize(x)` holds for every input.
pub fn normalize(text: &str) -> String {
    let p = patterns();

    let cleaned: String = text
        .chars()
        .filter(|c| *c != SENTINEL_OPEN && *c != SENTINEL_CLOSE)
        .collect();
    let collapsed = collapse_whitespace(p, &cleaned);

    let literals = p.quoted.replace_all(&collapsed, LITERAL_PLACEHOLDER);
    let literals = p.date.replace_all(&literals, LITERAL_PLACEHOLDER);
    let literals = p.number.replace_all(&literals, LITERAL_PLACEHOLDER);

    let protected = p.keyword.replace_all(&literals, |caps: &Captures| {
        let canonical = canonical_keyword(p, &caps[0]);
        match p.keywords.iter().position(|kw| *kw == canonical) {
            Some(idx) => format!(" {SENTINEL_OPEN}{idx}{SENTINEL_CLOSE} "),
            None => caps[0].to_string(),
        }
    });

    // Keywords always stand alone, whatever punctuation surrounded them.
    let protected = collapse_whitespace(p, &protected);

    let substituted = p.identifier_list.replace_all(&protected, |caps: &Captures| {
        let count = p.identifier.find_iter(&caps[2]).count();
        let names = vec![IDENTIFIER_PLACEHOLDER; count].join(", ");
        format!("{}{}", &caps[1], names)
    });

    let restored = p.sentinel.replace_all(&substituted, |caps: &Captures| {
        caps[1]
            .parse::<usize>()
            .ok()
            .and_then(|idx| p.keywords.get(idx))
            .map(|kw| kw.to_string())
            .unwrap_or_default()
    });

    collapse_whitespace(p, &restored)
}

fn collapse_whitespace(p: &Patterns, text: &str) -> String {
    p.whitespace.replace_all(text, " ").trim().to_string()
}

fn canonical_keyword(p: &Patterns, matched: &str) -> String {
    p.whitespace
        .replace_all(matched, " ")
        .to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn different_names_and_literals_share_one_shape() {
        let a = normalize("SELECT a, b FROM TBL1 WHERE x = 'L1'");
        let b = normalize("SELECT c, d FROM TBL2 WHERE x = 'L2'");
        assert_eq!(a, "SELECT NAME, NAME FROM NAME WHERE NAME = ?");
        assert_eq!(a, b);
    }

    #[test]
    fn names_glued_to_quoted_identifiers_are_consumed() {
        let once = normalize("SELECT a FROM \"Sales\"s WHERE s.x = 1");
        assert_eq!(once, "SELECT NAME FROM NAME WHERE NAME = ?");
        assert_eq!(normalize(&once), once);

        assert_eq!(normalize("SELECT \"x\"_y FROM t"), "SELECT NAME FROM NAME");
        assert_eq!(normalize("SELECT \"a, b\" FROM t"), "SELECT NAME FROM NAME");
    }

    const FRAGMENTS: &[&str] = &[
        "SELECT", "select", "FROM", "WHERE", "GROUP BY", "order\nby", "INSERT INTO",
        "VALUES", "MERGE INTO", "USING", "ON", "AS", "WHEN MATCHED THEN UPDATE", "SET",
        "JOIN", "a", "t.b", "\"Sales\"", "\"x\"_y", "s", "_z9", "a$", "#", "$", "1", "3.5",
        "01-Jan-24", "2024-03-01", "'L1'", "'it''s'", "'", "\"", ",", ".", ";", "(", ")",
        "=", "*", "?", "NAME", "é", "\u{1}", "\u{2}",
    ];

    const GAPS: &[&str] = &["", " ", "  ", "\n", ","];

    fn script() -> impl Strategy<Value = String> {
        prop::collection::vec(
            (prop::sample::select(FRAGMENTS), prop::sample::select(GAPS)),
            0..24,
        )
        .prop_map(|parts| {
            parts
                .into_iter()
                .map(|(fragment, gap)| format!("{fragment}{gap}"))
                .collect::<String>()
        })
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent_over_scripts(text in script()) {
            let once = normalize(&text);
            prop_assert_eq!(normalize(&once), once, "input {:?}", text);
        }

        #[test]
        fn normalization_is_idempotent_over_ascii(text in "[ -~\n\t]{0,80}") {
            let once = normalize(&text);
            prop_assert_eq!(normalize(&once), once, "input {:?}", text);
        }
    }

    #[test]
    fn identifier_lists_keep_their_arity() {
        assert_eq!(
            normalize("SELECT a, b, c FROM t1, t2"),
            "SELECT NAME, NAME, NAME FROM NAME, NAME"
        );
        assert_ne!(normalize("SELECT a FROM t"), normalize("SELECT a, b FROM t"));
    }

    #[test]
    fn keywords_are_case_insensitive_and_longest_first() {
        assert_eq!(
            normalize("insert   into T1 values (1, 'x')"),
            "INSERT INTO NAME VALUES (?, ?)"
        );
        assert_eq!(
            normalize("select a from t left   join u on t.id = u.id"),
            "SELECT NAME FROM NAME LEFT JOIN NAME ON NAME = u.id"
        );
    }

    #[test]
    fn literals_collapse_to_placeholders() {
        assert_eq!(
            normalize("WHERE d = '01-JAN-24' AND e = 15-Mar-2025 AND f = 3.75 AND g = 'it''s'"),
            "WHERE NAME = ? AND e = ? AND f = ? AND g = ?"
        );
        assert_eq!(normalize("WHERE d = 2024-03-01"), "WHERE NAME = ?");
    }

    #[test]
    fn keywords_inside_identifiers_are_left_alone() {
        assert_eq!(
            normalize("SELECT from_date, order_by_col FROM t"),
            "SELECT NAME, NAME FROM NAME"
        );
    }

    #[test]
    fn structural_order_is_preserved() {
        assert_ne!(
            normalize("SELECT a FROM t WHERE x = 1 GROUP BY a"),
            normalize("SELECT a FROM t GROUP BY a")
        );
    }
}
