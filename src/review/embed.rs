//! File embedding for sandboxes that cannot read arbitrary paths from the
//! reviewer process (spec §4.10). Budget-limited, with recorded skip reasons
//! so the prompt tells the reviewer what it is not seeing.

use std::fs;
use std::path::Path;

use super::prompt::{EmbedSkip, EmbeddedFile};

const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "pdf", "zip", "gz", "tar", "bz2", "xz",
    "7z", "woff", "woff2", "ttf", "otf", "eot", "so", "dylib", "dll", "exe", "bin", "wasm", "class",
    "jar", "sqlite", "db", "lock",
];

fn looks_binary(path: &Path, content: &[u8]) -> bool {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if BINARY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
            return true;
        }
    }
    content.contains(&0u8)
}

/// Embed a list of explicitly supplied repo-relative paths (plan review).
pub fn embed_explicit_files(
    repo_root: &Path,
    paths: &[String],
    budget: usize,
) -> (Vec<EmbeddedFile>, Vec<EmbedSkip>) {
    embed_files(repo_root, paths, budget)
}

/// Embed the set of files changed since a base rev (impl/completion review).
pub fn embed_changed_files(
    repo_root: &Path,
    paths: &[String],
    budget: usize,
) -> (Vec<EmbeddedFile>, Vec<EmbedSkip>) {
    embed_files(repo_root, paths, budget)
}

fn embed_files(repo_root: &Path, paths: &[String], budget: usize) -> (Vec<EmbeddedFile>, Vec<EmbedSkip>) {
    let mut embedded = Vec::new();
    let mut skipped = Vec::new();
    let mut remaining = budget;

    for rel in paths {
        let rel_path = Path::new(rel);
        if rel_path.is_absolute() || rel_path.components().any(|c| c == std::path::Component::ParentDir) {
            skipped.push(EmbedSkip { path: rel.clone(), reason: "path outside repo root".to_string() });
            continue;
        }
        let full = repo_root.join(rel_path);
        let canonical_ok = full
            .canonicalize()
            .map(|c| c.starts_with(repo_root.canonicalize().unwrap_or_else(|_| repo_root.to_path_buf())))
            .unwrap_or(false);
        if !canonical_ok {
            skipped.push(EmbedSkip { path: rel.clone(), reason: "path outside repo root".to_string() });
            continue;
        }

        let content = match fs::read(&full) {
            Ok(c) => c,
            Err(_) => {
                skipped.push(EmbedSkip { path: rel.clone(), reason: "deleted or unreadable".to_string() });
                continue;
            }
        };

        if looks_binary(&full, &content) {
            skipped.push(EmbedSkip { path: rel.clone(), reason: "binary file".to_string() });
            continue;
        }

        if remaining == 0 {
            skipped.push(EmbedSkip { path: rel.clone(), reason: "embed budget exhausted".to_string() });
            continue;
        }

        let text = String::from_utf8_lossy(&content).into_owned();
        if text.len() <= remaining {
            remaining -= text.len();
            embedded.push(EmbeddedFile { path: rel.clone(), content: text, truncated: false });
        } else {
            let mut cut = remaining;
            while cut > 0 && !text.is_char_boundary(cut) {
                cut -= 1;
            }
            let prefix = text[..cut].to_string();
            remaining = 0;
            embedded.push(EmbeddedFile { path: rel.clone(), content: prefix, truncated: true });
            skipped.push(EmbedSkip { path: rel.clone(), reason: "TRUNCATED: embed budget exhausted mid-file".to_string() });
        }
    }

    (embedded, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn embeds_small_text_file_fully() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {}").unwrap();
        let (embedded, skipped) = embed_explicit_files(dir.path(), &["a.rs".to_string()], 1000);
        assert_eq!(embedded.len(), 1);
        assert!(!embedded[0].truncated);
        assert!(skipped.is_empty());
    }

    #[test]
    fn skips_binary_extension() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("img.png"), [0u8, 1, 2, 3]).unwrap();
        let (embedded, skipped) = embed_explicit_files(dir.path(), &["img.png".to_string()], 1000);
        assert!(embedded.is_empty());
        assert_eq!(skipped.len(), 1);
        assert!(skipped[0].reason.contains("binary"));
    }

    #[test]
    fn rejects_path_outside_repo_root() {
        let dir = tempdir().unwrap();
        let (embedded, skipped) = embed_explicit_files(dir.path(), &["../escape.rs".to_string()], 1000);
        assert!(embedded.is_empty());
        assert_eq!(skipped.len(), 1);
        assert!(skipped[0].reason.contains("outside repo root"));
    }

    #[test]
    fn budget_of_zero_skips_everything_as_exhausted() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {}").unwrap();
        let (embedded, skipped) = embed_explicit_files(dir.path(), &["a.rs".to_string()], 0);
        assert!(embedded.is_empty());
        assert_eq!(skipped.len(), 1);
        assert!(skipped[0].reason.contains("budget exhausted"));
    }

    #[test]
    fn truncates_when_file_exceeds_remaining_budget() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "0123456789").unwrap();
        let (embedded, skipped) = embed_explicit_files(dir.path(), &["a.rs".to_string()], 5);
        assert_eq!(embedded.len(), 1);
        assert!(embedded[0].truncated);
        assert_eq!(embedded[0].content, "01234");
        assert!(skipped.iter().any(|s| s.reason.contains("TRUNCATED")));
    }

    #[test]
    fn deleted_file_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let (embedded, skipped) = embed_explicit_files(dir.path(), &["missing.rs".to_string()], 1000);
        assert!(embedded.is_empty());
        assert_eq!(skipped.len(), 1);
        assert!(skipped[0].reason.contains("unreadable"));
    }
}
