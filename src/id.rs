use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

use crate::error::{FlowError, Result};

static EPIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^fn-(\d+)(?:-([a-z0-9]+(?:-[a-z0-9]+)*))?$").unwrap());

/// `fn-<positive int>[-<slug>]`, e.g. `fn-1` or `fn-1-add-auth`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EpicId {
    raw: String,
    num: u64,
}

impl EpicId {
    pub fn parse(s: &str) -> Result<Self> {
        let caps = EPIC_RE
            .captures(s)
            .ok_or_else(|| FlowError::InvalidId(s.to_string(), "expected fn-N or fn-N-slug".into()))?;
        let num: u64 = caps[1]
            .parse()
            .map_err(|_| FlowError::InvalidId(s.to_string(), "epic number out of range".into()))?;
        Ok(Self {
            raw: s.to_string(),
            num,
        })
    }

    /// Build an id from its numeric component and an optional slug; the slug
    /// is assumed already normalized (see [`derive_slug`]).
    pub fn compose(num: u64, slug: Option<&str>) -> Self {
        let raw = match slug {
            Some(s) if !s.is_empty() => format!("fn-{num}-{s}"),
            _ => format!("fn-{num}"),
        };
        Self { raw, num }
    }

    pub fn num(&self) -> u64 {
        self.num
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for EpicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl TryFrom<String> for EpicId {
    type Error = FlowError;
    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<EpicId> for String {
    fn from(id: EpicId) -> String {
        id.raw
    }
}

/// `<EpicId>.<positive int>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId {
    raw: String,
    epic: EpicId,
    num: u64,
}

impl TaskId {
    pub fn parse(s: &str) -> Result<Self> {
        let (epic_part, num_part) = s
            .rsplit_once('.')
            .ok_or_else(|| FlowError::InvalidId(s.to_string(), "expected <epic-id>.<task-num>".into()))?;
        let epic = EpicId::parse(epic_part)?;
        let num: u64 = num_part
            .parse()
            .map_err(|_| FlowError::InvalidId(s.to_string(), "task number out of range".into()))?;
        if num == 0 {
            return Err(FlowError::InvalidId(s.to_string(), "task number must be positive".into()));
        }
        Ok(Self {
            raw: s.to_string(),
            epic,
            num,
        })
    }

    pub fn compose(epic: &EpicId, num: u64) -> Self {
        Self {
            raw: format!("{}.{}", epic.as_str(), num),
            epic: epic.clone(),
            num,
        }
    }

    /// Textual prefix up to the last `.`, preserving the slug.
    pub fn epic_of(&self) -> &EpicId {
        &self.epic
    }

    pub fn num(&self) -> u64 {
        self.num
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Lexicographic sort key over `(epic_num, task_num)`.
    pub fn sort_key(&self) -> (u64, u64) {
        (self.epic.num(), self.num)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl TryFrom<String> for TaskId {
    type Error = FlowError;
    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> String {
        id.raw
    }
}

/// Unicode NFKD -> ASCII -> lowercase -> collapse non-word runs to `-` ->
/// truncate to <= 40 chars at a word boundary; empty result falls back to a
/// random 3-character `[a-z0-9]` suffix.
pub fn derive_slug(title: &str) -> String {
    let ascii: String = title
        .nfkd()
        .filter(|c| c.is_ascii())
        .collect::<String>()
        .to_lowercase();

    let mut collapsed = String::with_capacity(ascii.len());
    let mut last_was_sep = false;
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            collapsed.push(c);
            last_was_sep = false;
        } else if !last_was_sep {
            collapsed.push('-');
            last_was_sep = true;
        }
    }
    let trimmed = collapsed.trim_matches('-');

    let truncated = truncate_at_word_boundary(trimmed, 40);

    if truncated.is_empty() {
        random_suffix()
    } else {
        truncated
    }
}

fn truncate_at_word_boundary(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut cut = max_len;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut slice = &s[..cut];
    if let Some(idx) = slice.rfind('-') {
        if idx > 0 {
            slice = &slice[..idx];
        }
    }
    slice.trim_matches('-').to_string()
}

fn random_suffix() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut buf = [0u8; 3];
    getrandom::fill(&mut buf).expect("system randomness unavailable");
    buf.iter().map(|b| ALPHABET[(*b as usize) % ALPHABET.len()] as char).collect()
}
