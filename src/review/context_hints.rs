//! Context hints: for each changed file, extract exported/defined symbols
//! with language-specific regexes, then grep the rest of the repo for
//! references to those symbols (spec §4.10). Never crash on parse errors —
//! a file this can't make sense of is silently skipped.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

const MAX_HINTS: usize = 15;

struct LangRules {
    extensions: &'static [&'static str],
    symbol_re: &'static LazyLock<Regex>,
}

static RUST_SYMBOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*pub(?:\([^)]*\))?\s+(?:fn|struct|enum|trait|const|static)\s+(\w+)").unwrap());
static PY_SYMBOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(?:def|class)\s+(\w+)").unwrap());
static JS_SYMBOL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^export\s+(?:default\s+)?(?:async\s+)?(?:function|class|const|let)\s+(\w+)").unwrap()
});
static GO_SYMBOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^func\s+(?:\([^)]*\)\s*)?([A-Z]\w*)").unwrap());

static LANGS: &[LangRules] = &[
    LangRules { extensions: &["rs"], symbol_re: &RUST_SYMBOL_RE },
    LangRules { extensions: &["py"], symbol_re: &PY_SYMBOL_RE },
    LangRules { extensions: &["js", "ts", "jsx", "tsx"], symbol_re: &JS_SYMBOL_RE },
    LangRules { extensions: &["go"], symbol_re: &GO_SYMBOL_RE },
];

fn rules_for(path: &Path) -> Option<&'static LangRules> {
    let ext = path.extension()?.to_str()?;
    LANGS.iter().find(|r| r.extensions.contains(&ext))
}

fn extract_symbols(path: &Path, content: &str) -> Vec<String> {
    let Some(rules) = rules_for(path) else {
        return Vec::new();
    };
    rules
        .symbol_re
        .captures_iter(content)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Collect up to [`MAX_HINTS`] `- <path>:<line> - references <symbol>` lines
/// by extracting symbols defined in `changed_files`, then grepping the rest
/// of the repo tree for references to each. Never panics on unreadable or
/// unparseable files; it simply contributes nothing for them.
pub fn collect(repo_root: &Path, changed_files: &[String]) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for rel in changed_files {
        let full = repo_root.join(rel);
        let Ok(content) = fs::read_to_string(&full) else {
            continue;
        };
        symbols.extend(extract_symbols(&full, &content));
    }
    symbols.sort();
    symbols.dedup();
    if symbols.is_empty() {
        return Vec::new();
    }

    let changed_set: std::collections::HashSet<&str> = changed_files.iter().map(String::as_str).collect();
    let mut hints = Vec::new();

    'walk: for entry in walk_files(repo_root) {
        let rel = entry
            .strip_prefix(repo_root)
            .unwrap_or(&entry)
            .to_string_lossy()
            .into_owned();
        if changed_set.contains(rel.as_str()) {
            continue;
        }
        let Ok(content) = fs::read_to_string(&entry) else {
            continue;
        };
        for (line_no, line) in content.lines().enumerate() {
            for symbol in &symbols {
                if line.contains(symbol.as_str()) {
                    hints.push(format!("- {}:{} - references {}", rel, line_no + 1, symbol));
                    if hints.len() >= MAX_HINTS {
                        break 'walk;
                    }
                }
            }
        }
    }

    hints
}

/// Shallow, best-effort source tree walk skipping common noise directories.
/// Errors (permission denied, broken symlinks) are swallowed per the
/// "never crash on parse errors" contract.
fn walk_files(root: &Path) -> Vec<std::path::PathBuf> {
    const SKIP_DIRS: &[&str] = &[".git", "target", "node_modules", ".flow"];
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else { continue };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if SKIP_DIRS.contains(&name) {
                        continue;
                    }
                }
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn finds_reference_to_symbol_defined_in_changed_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("lib.rs"), "pub fn widget_factory() {}\n").unwrap();
        fs::write(dir.path().join("caller.rs"), "fn main() { widget_factory(); }\n").unwrap();

        let hints = collect(dir.path(), &["lib.rs".to_string()]);
        assert_eq!(hints.len(), 1);
        assert!(hints[0].contains("caller.rs:1"));
        assert!(hints[0].contains("widget_factory"));
    }

    #[test]
    fn returns_empty_when_no_symbols_extracted() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "just some notes").unwrap();
        let hints = collect(dir.path(), &["notes.txt".to_string()]);
        assert!(hints.is_empty());
    }

    #[test]
    fn never_panics_on_unreadable_changed_file() {
        let dir = tempdir().unwrap();
        let hints = collect(dir.path(), &["does-not-exist.rs".to_string()]);
        assert!(hints.is_empty());
    }
}
