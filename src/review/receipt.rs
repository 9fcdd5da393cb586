//! Review receipt I/O. Writing a receipt is the single source of truth that
//! a review ran (spec §4.10): it happens only after verdict extraction
//! succeeds, and any stale receipt is proactively removed on failure.

use std::path::Path;

use crate::error::Result;
use crate::io;
use crate::model::ReviewReceipt;

pub fn read(path: &Path) -> Result<Option<ReviewReceipt>> {
    io::read_json_opt(path)
}

pub fn write(path: &Path, receipt: &ReviewReceipt) -> Result<()> {
    io::write_json_atomic(path, receipt)
}

/// Removing a receipt that doesn't exist is a silent no-op — failure paths
/// call this unconditionally without checking first.
pub fn delete(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ReceiptType, Verdict};
    use tempfile::tempdir;

    fn sample() -> ReviewReceipt {
        ReviewReceipt {
            r#type: ReceiptType::ImplReview,
            id: "fn-1.1".to_string(),
            mode: "codex".to_string(),
            verdict: Verdict::Ship,
            session_id: Some("sess-1".to_string()),
            timestamp: crate::model::now(),
            review: "looks good".to_string(),
            iteration: None,
            focus: None,
            base: Some("main".to_string()),
        }
    }

    #[test]
    fn write_then_read_roundtrips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("receipt.json");
        write(&path, &sample()).unwrap();
        let loaded = read(&path).unwrap().unwrap();
        assert_eq!(loaded.session_id.as_deref(), Some("sess-1"));
    }

    #[test]
    fn delete_missing_receipt_is_a_noop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.json");
        delete(&path).unwrap();
    }
}
