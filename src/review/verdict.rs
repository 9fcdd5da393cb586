//! Verdict extraction and sandbox-failure detection (spec §4.10): a small,
//! specific pattern set, not a substring check, so reviewer prose that
//! casually mentions "blocked" or "policy" doesn't false-positive.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::Verdict;

static VERDICT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<verdict>\s*(SHIP|NEEDS_WORK|MAJOR_RETHINK)\s*</verdict>").unwrap());

/// The final occurrence wins, line-independent.
pub fn extract_verdict(text: &str) -> Option<Verdict> {
    let last = VERDICT_RE.captures_iter(text).last()?;
    match &last[1] {
        "SHIP" => Some(Verdict::Ship),
        "NEEDS_WORK" => Some(Verdict::NeedsWork),
        "MAJOR_RETHINK" => Some(Verdict::MajorRethink),
        _ => None,
    }
}

static SANDBOX_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)blocked by policy",
        r"(?i)rejected by policy",
        r"(?i)filesystem (read|write) is blocked",
        r"(?i)operation not permitted.*sandbox",
        r"(?i)appcontainer",
        r"(?i)sandbox.*denied",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Sandbox-failure detection restricted to error contexts (stderr, or
/// failed-item text aggregated from the JSON event stream) and a small
/// anchored pattern set, per spec §9.
pub fn looks_sandbox_blocked(stderr: &str, failed_item_text: &str) -> bool {
    SANDBOX_PATTERNS
        .iter()
        .any(|re| re.is_match(stderr) || re.is_match(failed_item_text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_ship_verdict() {
        assert_eq!(extract_verdict("looks good\n<verdict>SHIP</verdict>"), Some(Verdict::Ship));
    }

    #[test]
    fn final_occurrence_wins() {
        let text = "<verdict>NEEDS_WORK</verdict>\nactually after further thought\n<verdict>SHIP</verdict>";
        assert_eq!(extract_verdict(text), Some(Verdict::Ship));
    }

    #[test]
    fn missing_verdict_returns_none() {
        assert_eq!(extract_verdict("no tag here"), None);
    }

    #[test]
    fn detects_sandbox_denial_patterns() {
        assert!(looks_sandbox_blocked("Error: filesystem write is blocked", ""));
        assert!(looks_sandbox_blocked("", "rejected by policy: no network"));
    }

    #[test]
    fn does_not_false_positive_on_casual_mentions() {
        assert!(!looks_sandbox_blocked("", "our security policy review process looks solid"));
        assert!(!looks_sandbox_blocked("the PR was blocked by a failing check", ""));
    }
}
