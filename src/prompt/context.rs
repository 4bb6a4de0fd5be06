use super::schema::render_target_hint;
use crate::store::Example;

const REFERENCE_REQUIREMENT_HEADER: &str = "--- Reference requirement:";
const REFERENCE_SOLUTION_HEADER: &str =
    "--- Reference script (follow its structure and step order exactly):";
const NEW_REQUIREMENT_HEADER: &str = "--- New requirement (write the script for this):";
const TARGET_TABLES_HEADER: &str = "--- Target tables:";

/// Renders the reference example and the new requirement into one prompt body.
///
/// Deterministic and side-effect free. The target-table section is omitted
/// when no schema text is supplied.
pub fn format_context(reference: &Example, query_text: &str, target_schema: Option<&str>) -> String {
    let mut sections = vec![
        format!(
            "{}\n{}",
            REFERENCE_REQUIREMENT_HEADER,
            reference.requirement_text.trim()
        ),
        format!(
            "{}\n{}",
            REFERENCE_SOLUTION_HEADER,
            reference.solution_text.trim()
        ),
        format!("{}\n{}", NEW_REQUIREMENT_HEADER, query_text.trim()),
    ];

    if let Some(hint) = target_schema
        .map(render_target_hint)
        .filter(|hint| !hint.is_empty())
    {
        sections.push(format!("{}\n{}", TARGET_TABLES_HEADER, hint));
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ExampleMetadata;

    fn reference() -> Example {
        Example {
            id: "ref".into(),
            requirement_text: "Pay dealers 2% on recharge.".into(),
            solution_text: "CREATE TABLE X AS SELECT * FROM Y;".into(),
            metadata: ExampleMetadata::default(),
        }
    }

    #[test]
    fn sections_appear_in_order() {
        let body = format_context(&reference(), "  Pay retailers 3% on bundles. ", None);
        let req = body.find(REFERENCE_REQUIREMENT_HEADER).unwrap();
        let sol = body.find(REFERENCE_SOLUTION_HEADER).unwrap();
        let new = body.find(NEW_REQUIREMENT_HEADER).unwrap();
        assert!(req < sol && sol < new);
        assert!(body.ends_with("Pay retailers 3% on bundles."));
        assert!(!body.contains(TARGET_TABLES_HEADER));
    }

    #[test]
    fn target_hint_is_appended_when_present() {
        let body = format_context(
            &reference(),
            "new",
            Some("AGENT_PAYOUT:\nMSISDN, VARCHAR2(20)\nAMOUNT, NUMBER"),
        );
        assert!(body.contains(TARGET_TABLES_HEADER));
        assert!(body.contains("AGENT_PAYOUT"));

        let blank = format_context(&reference(), "new", Some("   "));
        assert!(!blank.contains(TARGET_TABLES_HEADER));
    }

    #[test]
    fn rendering_is_deterministic() {
        let a = format_context(&reference(), "q", Some("T:\nA"));
        let b = format_context(&reference(), "q", Some("T:\nA"));
        assert_eq!(a, b);
    }
}
