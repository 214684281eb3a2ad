//! Report markdown contract (§6.6): "Opening synthesis paragraphs →
//! `**Key Takeaways**` bullets → thematic sections → `## References`
//! numbered list of `[Publication](url) | date`. In-body attribution is
//! natural language; bracket-citation markers `[n]` must not appear in
//! body." Enforced here and reused by the delivery worker's pre-send
//! transformation (§4.I step 2).

use regex::Regex;
use std::sync::OnceLock;

use crate::error::PipelineError;

fn bracket_citation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[[0-9]+\]").expect("valid regex literal"))
}

fn markdown_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid regex literal"))
}

/// §4.F step 9's contract check: no bracket-citation markers in the body,
/// and a `## References` section must be present. Called once immediately
/// after report compilation, before the result is persisted, so a
/// contract violation is retried with the rest of 2-9 rather than shipped.
pub fn validate_report_contract(markdown: &str) -> Result<(), PipelineError> {
    let body = markdown
        .split("## References")
        .next()
        .unwrap_or(markdown);
    if bracket_citation_pattern().is_match(body) {
        return Err(PipelineError::ReportContractViolation(
            "bracket-citation marker found in report body".into(),
        ));
    }
    if !markdown.contains("## References") {
        return Err(PipelineError::ReportContractViolation(
            "report is missing a ## References section".into(),
        ));
    }
    if !markdown.contains("**Key Takeaways**") {
        return Err(PipelineError::ReportContractViolation(
            "report is missing a **Key Takeaways** section".into(),
        ));
    }
    Ok(())
}

/// §4.I step 2: "strips the References section and inline links, leaving
/// natural-attribution text intact."
#[must_use]
pub fn strip_references_and_links(markdown: &str) -> String {
    let without_references = markdown
        .split("## References")
        .next()
        .unwrap_or(markdown)
        .trim_end();
    markdown_link_pattern()
        .replace_all(without_references, "$1")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_report_contract_rejects_bracket_citations_in_body() {
        let markdown = "Intro.\n\n**Key Takeaways**\n- a[1]\n\n## References\n1. [Pub](https://x) | 2026-01-01";
        assert!(validate_report_contract(markdown).is_err());
    }

    #[test]
    fn validate_report_contract_rejects_missing_references_section() {
        let markdown = "Intro.\n\n**Key Takeaways**\n- a point";
        assert!(validate_report_contract(markdown).is_err());
    }

    #[test]
    fn validate_report_contract_accepts_well_formed_report() {
        let markdown = "Intro.\n\n**Key Takeaways**\n- a point\n\n## Theme One\nSome prose.\n\n## References\n1. [Pub](https://x) | 2026-01-01";
        assert!(validate_report_contract(markdown).is_ok());
    }

    #[test]
    fn strip_references_and_links_removes_section_and_flattens_links() {
        let markdown = "Intro text with a [citation](https://x).\n\n## References\n1. [Pub](https://x) | 2026-01-01";
        let stripped = strip_references_and_links(markdown);
        assert!(!stripped.contains("## References"));
        assert!(!stripped.contains("https://x"));
        assert!(stripped.contains("citation"));
    }
}
