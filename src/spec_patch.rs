use regex::Regex;

use crate::error::{FlowError, Result};

pub const REQUIRED_TASK_HEADINGS: &[&str] = &[
    "## Description",
    "## Acceptance",
    "## Done summary",
    "## Evidence",
];

/// Count of lines exactly matching `heading`, line-anchored so code-fenced
/// occurrences of the same text are not mistaken for real headings.
fn count_heading_lines(content: &str, heading: &str) -> usize {
    content.lines().filter(|line| *line == heading).count()
}

/// Heading-scoped section replace per spec §4.5.
///
/// 1. Reject if `heading` occurs more than once (duplicate-heading).
/// 2. Tolerate `new_body` already starting with the heading line (stripped).
/// 3. Walk lines; on the heading, emit it then `new_body` trimmed of
///    trailing whitespace; suppress original lines until the next `## `
///    heading.
/// 4. Reject if the heading is never found.
pub fn patch_section(content: &str, heading: &str, new_body: &str) -> Result<String> {
    let occurrences = count_heading_lines(content, heading);
    if occurrences > 1 {
        return Err(FlowError::DuplicateHeading(heading.to_string(), occurrences));
    }

    let mut body = new_body;
    if let Some(rest) = body.strip_prefix(heading) {
        body = rest.strip_prefix('\n').unwrap_or(rest);
    }
    let body = body.trim_end();

    let mut out_lines: Vec<String> = Vec::new();
    let mut found = false;
    let mut suppressing = false;

    for line in content.lines() {
        if !suppressing && line == heading {
            found = true;
            out_lines.push(line.to_string());
            if !body.is_empty() {
                out_lines.push(body.to_string());
            }
            suppressing = true;
            continue;
        }
        if suppressing {
            if line.starts_with("## ") {
                suppressing = false;
            } else {
                continue;
            }
        }
        out_lines.push(line.to_string());
    }

    if !found {
        return Err(FlowError::MissingHeading(heading.to_string()));
    }

    let mut result = out_lines.join("\n");
    if content.ends_with('\n') {
        result.push('\n');
    }
    Ok(result)
}

/// Text between `heading` and the next `## ` heading (or EOF), trimmed.
pub fn get_section(content: &str, heading: &str) -> Option<String> {
    let mut lines = content.lines();
    for line in lines.by_ref() {
        if line == heading {
            let mut collected = Vec::new();
            for next in lines.by_ref() {
                if next.starts_with("## ") {
                    break;
                }
                collected.push(next);
            }
            return Some(collected.join("\n").trim().to_string());
        }
    }
    None
}

/// Every heading in [`REQUIRED_TASK_HEADINGS`] must appear exactly once,
/// line-anchored.
pub fn validate_task_spec_headings(content: &str) -> Result<()> {
    for heading in REQUIRED_TASK_HEADINGS {
        let count = count_heading_lines(content, heading);
        if count == 0 {
            return Err(FlowError::MissingHeading(heading.to_string()));
        }
        if count > 1 {
            return Err(FlowError::DuplicateHeading(heading.to_string(), count));
        }
    }
    Ok(())
}

/// Reset `## Evidence`'s body to the empty three-line template, preserving
/// the heading and every other section. Tolerant of both line endings.
pub fn clear_evidence(content: &str) -> Result<String> {
    let normalized_has_crlf = content.contains("\r\n");
    let template = "- Commits:\n- Tests:\n- PRs:";
    let patched = patch_section(content, "## Evidence", template)?;
    if normalized_has_crlf && !patched.contains("\r\n") {
        Ok(patched.replace('\n', "\r\n"))
    } else {
        Ok(patched)
    }
}

/// Reset `## Done summary`'s body to the `TBD` placeholder, preserving the
/// heading and every other section. Used by `task reset` to drop any
/// `Blocked: …` text a prior `block()` call appended (spec §8).
pub fn clear_done_summary(content: &str) -> Result<String> {
    patch_section(content, "## Done summary", "TBD")
}

/// Render an evidence object to the three standard bullet lines, per spec
/// §4.6: comma-joined values, empty trailing colon when a list is empty.
pub fn render_evidence(evidence: &crate::model::Evidence) -> String {
    format!(
        "- Commits: {}\n- Tests: {}\n- PRs: {}",
        evidence.commits.join(", "),
        evidence.tests.join(", "),
        evidence.prs.join(", ")
    )
}

/// Matches the rendered evidence bullet pattern — used by callers that need
/// to detect whether an Evidence section still contains the empty template.
pub fn is_default_evidence_body(body: &str) -> bool {
    static EMPTY_RE: std::sync::LazyLock<Regex> =
        std::sync::LazyLock::new(|| Regex::new(r"^-\s*Commits:\s*\n-\s*Tests:\s*\n-\s*PRs:\s*$").unwrap());
    EMPTY_RE.is_match(body.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# Title\n\n## Description\n\nOld desc\n\n## Acceptance\n\nOld acc\n\n## Done summary\n\nTBD\n\n## Evidence\n\n- Commits:\n- Tests:\n- PRs:\n";

    #[test]
    fn patch_section_replaces_body_and_stops_at_next_heading() {
        let patched = patch_section(SAMPLE, "## Description", "New desc").unwrap();
        assert!(patched.contains("## Description\nNew desc\n\n## Acceptance"));
        assert!(patched.contains("Old acc"));
    }

    #[test]
    fn patch_section_tolerates_new_body_repeating_heading() {
        let patched = patch_section(SAMPLE, "## Description", "## Description\nNew desc").unwrap();
        assert!(patched.contains("## Description\nNew desc\n\n## Acceptance"));
    }

    #[test]
    fn patch_section_fails_on_missing_heading() {
        let err = patch_section(SAMPLE, "## Risks", "x").unwrap_err();
        assert!(matches!(err, FlowError::MissingHeading(_)));
    }

    #[test]
    fn patch_section_fails_on_duplicate_heading() {
        let dup = format!("{SAMPLE}\n## Description\nagain\n");
        let err = patch_section(&dup, "## Description", "x").unwrap_err();
        assert!(matches!(err, FlowError::DuplicateHeading(_, 2)));
    }

    #[test]
    fn get_section_returns_trimmed_body() {
        let body = get_section(SAMPLE, "## Acceptance").unwrap();
        assert_eq!(body, "Old acc");
    }

    #[test]
    fn validate_task_spec_headings_passes_for_well_formed_spec() {
        validate_task_spec_headings(SAMPLE).unwrap();
    }

    #[test]
    fn validate_task_spec_headings_detects_missing_heading() {
        let missing = SAMPLE.replace("## Evidence", "## NotEvidence");
        assert!(validate_task_spec_headings(&missing).is_err());
    }

    #[test]
    fn clear_evidence_resets_to_empty_template() {
        let with_evidence = patch_section(SAMPLE, "## Evidence", "- Commits: abc\n- Tests:\n- PRs:").unwrap();
        let cleared = clear_evidence(&with_evidence).unwrap();
        let body = get_section(&cleared, "## Evidence").unwrap();
        assert!(is_default_evidence_body(&body));
    }

    #[test]
    fn render_evidence_joins_values_and_blanks_empty_lists() {
        let ev = crate::model::Evidence {
            commits: vec!["abc".into(), "def".into()],
            tests: vec![],
            prs: vec!["PR-1".into()],
        };
        assert_eq!(render_evidence(&ev), "- Commits: abc, def\n- Tests: \n- PRs: PR-1");
    }
}
