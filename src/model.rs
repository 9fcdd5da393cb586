use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{EpicId, TaskId};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpicStatus {
    Open,
    Done,
}

impl Default for EpicStatus {
    fn default() -> Self {
        Self::Open
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    Unknown,
    NeedsWork,
    Ship,
}

impl Default for ReviewVerdict {
    fn default() -> Self {
        Self::Unknown
    }
}

impl ReviewVerdict {
    pub fn parse_extracted(s: &str) -> Option<Self> {
        match s {
            "SHIP" => Some(Self::Ship),
            "NEEDS_WORK" => Some(Self::NeedsWork),
            "MAJOR_RETHINK" => Some(Self::NeedsWork),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Blocked,
    Done,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Todo
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Blocked => "blocked",
            Self::Done => "done",
        };
        write!(f, "{s}")
    }
}

/// Epic definition record, git-tracked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Epic {
    pub id: EpicId,
    pub title: String,
    #[serde(default)]
    pub status: EpicStatus,
    #[serde(default)]
    pub plan_review_status: ReviewVerdict,
    pub plan_reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completion_review_status: ReviewVerdict,
    pub completion_reviewed_at: Option<DateTime<Utc>>,
    pub branch_name: Option<String>,
    #[serde(default)]
    pub depends_on_epics: Vec<EpicId>,
    pub spec_path: String,
    pub default_impl: Option<String>,
    pub default_review: Option<String>,
    pub default_sync: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Task definition record, git-tracked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub epic: EpicId,
    pub title: String,
    pub priority: Option<i64>,
    #[serde(default)]
    pub depends_on: Vec<TaskId>,
    pub spec_path: String,
    pub r#impl: Option<String>,
    pub review: Option<String>,
    pub sync: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Legacy runtime fields embedded directly in older definition files;
    /// retained only to feed the backward-compat overlay in [`crate::store::runtime`].
    #[serde(flatten)]
    pub legacy_runtime: LegacyRuntimeFields,
}

/// Runtime fields that older schema versions stored inline in the task
/// definition JSON. Captured via `#[serde(flatten)]` so reading an old file
/// neither errors nor silently drops them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacyRuntimeFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
}

impl LegacyRuntimeFields {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.assignee.is_none()
            && self.claimed_at.is_none()
            && self.claim_note.is_none()
            && self.evidence.is_none()
            && self.blocked_reason.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(default)]
    pub commits: Vec<String>,
    #[serde(default)]
    pub tests: Vec<String>,
    #[serde(default)]
    pub prs: Vec<String>,
}

impl Evidence {
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty() && self.tests.is_empty() && self.prs.is_empty()
    }
}

/// Runtime record, git-ignored, stored separately in the state dir.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeState {
    #[serde(default)]
    pub status: TaskStatus,
    pub assignee: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub claim_note: String,
    #[serde(default)]
    pub evidence: Evidence,
    pub blocked_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            status: TaskStatus::Todo,
            assignee: None,
            claimed_at: None,
            claim_note: String::new(),
            evidence: Evidence::default(),
            blocked_reason: None,
            updated_at: now(),
        }
    }
}

impl RuntimeState {
    /// Backward-compat overlay: construct a runtime view from legacy fields
    /// embedded in the definition file, per spec §4.4 / §9.
    pub fn from_legacy(legacy: &LegacyRuntimeFields) -> Self {
        Self {
            status: legacy.status.unwrap_or_default(),
            assignee: legacy.assignee.clone(),
            claimed_at: legacy.claimed_at,
            claim_note: legacy.claim_note.clone().unwrap_or_default(),
            evidence: legacy.evidence.clone().unwrap_or_default(),
            blocked_reason: legacy.blocked_reason.clone(),
            updated_at: now(),
        }
    }
}

/// A task view composed by overlaying runtime onto definition. Readers
/// should build this via `merge`, never mutate a single combined struct
/// in place — see spec §9.
#[derive(Debug, Clone, Serialize)]
pub struct MergedTask {
    #[serde(flatten)]
    pub definition: TaskDefinitionView,
    #[serde(flatten)]
    pub runtime: RuntimeState,
}

/// Just the definition-store fields of a task, excluding the legacy runtime
/// flatten bag (which is never surfaced to readers once merged).
#[derive(Debug, Clone, Serialize)]
pub struct TaskDefinitionView {
    pub id: TaskId,
    pub epic: EpicId,
    pub title: String,
    pub priority: Option<i64>,
    pub depends_on: Vec<TaskId>,
    pub spec_path: String,
    pub r#impl: Option<String>,
    pub review: Option<String>,
    pub sync: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Task> for TaskDefinitionView {
    fn from(t: &Task) -> Self {
        Self {
            id: t.id.clone(),
            epic: t.epic.clone(),
            title: t.title.clone(),
            priority: t.priority,
            depends_on: t.depends_on.clone(),
            spec_path: t.spec_path.clone(),
            r#impl: t.r#impl.clone(),
            review: t.review.clone(),
            sync: t.sync.clone(),
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

pub fn merge(task: &Task, runtime: Option<RuntimeState>) -> MergedTask {
    let runtime = runtime.unwrap_or_else(|| {
        if task.legacy_runtime.is_empty() {
            RuntimeState::default()
        } else {
            RuntimeState::from_legacy(&task.legacy_runtime)
        }
    });
    MergedTask {
        definition: TaskDefinitionView::from(task),
        runtime,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptType {
    PlanReview,
    ImplReview,
    CompletionReview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Ship,
    NeedsWork,
    MajorRethink,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ship => "SHIP",
            Self::NeedsWork => "NEEDS_WORK",
            Self::MajorRethink => "MAJOR_RETHINK",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewReceipt {
    pub r#type: ReceiptType,
    pub id: String,
    pub mode: String,
    pub verdict: Verdict,
    pub session_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub review: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointTaskEntry {
    pub id: TaskId,
    pub data: Task,
    pub spec: String,
    pub runtime: Option<RuntimeState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointEpicEntry {
    pub data: Epic,
    pub spec: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub epic_id: EpicId,
    pub epic: CheckpointEpicEntry,
    pub tasks: Vec<CheckpointTaskEntry>,
}
