use std::path::{Path, PathBuf};

use git2::{DiffOptions, Repository};

/// Find the repository root ("show repo root") by discovering a git
/// repository starting at `cwd` and walking up. Returns `None` outside a
/// repository; callers fall back to `cwd`.
pub fn find_repo_root(cwd: &Path) -> Option<PathBuf> {
    let repo = Repository::discover(cwd).ok()?;
    repo.workdir().map(|p| p.to_path_buf())
}

/// Find the git "common dir" — shared across all worktrees of one clone —
/// so the runtime state dir can live in one place regardless of which
/// worktree an invocation runs from.
pub fn find_common_dir(repo_root: &Path) -> Option<PathBuf> {
    let repo = Repository::discover(repo_root).ok()?;
    Some(repo.commondir().to_path_buf())
}

pub fn config_value(repo_root: &Path, key: &str) -> Option<String> {
    let repo = Repository::discover(repo_root).ok()?;
    let config = repo.config().ok()?;
    config.get_string(key).ok()
}

#[derive(Debug, Clone)]
pub struct HeadInfo {
    pub branch: Option<String>,
    pub sha: String,
}

pub fn current_head_info(repo_root: &Path) -> Option<HeadInfo> {
    let repo = Repository::discover(repo_root).ok()?;
    let head = repo.head().ok()?;
    let branch = head.shorthand().map(|s| s.to_string());
    let commit = head.peel_to_commit().ok()?;
    Some(HeadInfo {
        branch,
        sha: commit.id().to_string(),
    })
}

/// One-line "short_sha summary" strings for commits reachable from `end`
/// but not from `start`.
pub fn commits_since(repo_root: &Path, start: &str, end: &str) -> Vec<String> {
    (|| -> Option<Vec<String>> {
        let repo = Repository::discover(repo_root).ok()?;
        let mut walk = repo.revwalk().ok()?;
        let end_oid = repo.revparse_single(end).ok()?.id();
        walk.push(end_oid).ok()?;
        if let Ok(start_obj) = repo.revparse_single(start) {
            let _ = walk.hide(start_obj.id());
        }
        let mut out = Vec::new();
        for oid in walk.flatten() {
            if let Ok(commit) = repo.find_commit(oid) {
                let short = oid.to_string().chars().take(10).collect::<String>();
                let summary = commit.summary().unwrap_or("").to_string();
                out.push(format!("{short} {summary}"));
            }
        }
        Some(out)
    })()
    .unwrap_or_default()
}

/// List of repo-relative paths changed between `start` and `end` (`HEAD` if
/// `end` is empty isn't special-cased here — callers pass an explicit rev).
pub fn changed_files_since(repo_root: &Path, start: &str, end: &str) -> Vec<String> {
    (|| -> Option<Vec<String>> {
        let repo = Repository::discover(repo_root).ok()?;
        let start_tree = repo.revparse_single(start).ok()?.peel_to_tree().ok()?;
        let end_tree = repo.revparse_single(end).ok()?.peel_to_tree().ok()?;
        let diff = repo
            .diff_tree_to_tree(Some(&start_tree), Some(&end_tree), None)
            .ok()?;
        let mut paths = Vec::new();
        for delta in diff.deltas() {
            if let Some(p) = delta.new_file().path().or_else(|| delta.old_file().path()) {
                paths.push(p.to_string_lossy().into_owned());
            }
        }
        Some(paths)
    })()
    .unwrap_or_default()
}

/// Unified diff text for `<base>..HEAD`, capped at `max_bytes`. Returns
/// `(text, truncated)`. Diff generation errors yield an empty, non-truncated
/// diff rather than failing the whole review — the prompt still gets built
/// with whatever context is available.
pub fn diff_capped(repo_root: &Path, base: &str, max_bytes: usize) -> (String, bool) {
    let result = (|| -> Option<(String, bool)> {
        let repo = Repository::discover(repo_root).ok()?;
        let base_tree = repo.revparse_single(base).ok()?.peel_to_tree().ok()?;
        let head_tree = repo.head().ok()?.peel_to_tree().ok()?;
        let mut opts = DiffOptions::new();
        let diff = repo
            .diff_tree_to_tree(Some(&base_tree), Some(&head_tree), Some(&mut opts))
            .ok()?;
        let mut buf = String::new();
        let mut truncated = false;
        diff.print(git2::DiffFormat::Patch, |_delta, _hunk, line| {
            // Stop asking the diff for more lines once the cap is hit, so a
            // multi-MiB diff is never fully buffered just to be truncated.
            if buf.len() >= max_bytes {
                truncated = true;
                return false;
            }
            if let Ok(content) = std::str::from_utf8(line.content()) {
                let prefix = match line.origin() {
                    '+' | '-' | ' ' => line.origin().to_string(),
                    _ => String::new(),
                };
                buf.push_str(&prefix);
                buf.push_str(content);
            }
            true
        })
        .ok()?;
        Some((buf, truncated))
    })()
    .unwrap_or_default();

    let (mut text, mut truncated) = result;
    if text.len() > max_bytes {
        let mut cut = max_bytes;
        while cut > 0 && !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        truncated = true;
    }
    (text, truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_repo_root_returns_none_outside_repo() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(find_repo_root(tmp.path()).is_none());
    }

    #[test]
    fn diff_capped_truncates_past_budget() {
        let (text, truncated) = diff_capped(Path::new("/nonexistent"), "HEAD", 10);
        assert_eq!(text, "");
        assert!(!truncated);
    }
}
