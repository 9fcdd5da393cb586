use thiserror::Error;

/// Exit code class per spec: 0 success, 1 domain error, 2 tool-integration
/// failure, 3 sandbox/timeout failure. Callers map this to `std::process::exit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
    Domain,
    ToolIntegration,
    Sandbox,
}

impl ExitClass {
    pub fn code(self) -> i32 {
        match self {
            Self::Domain => 1,
            Self::ToolIntegration => 2,
            Self::Sandbox => 3,
        }
    }
}

#[derive(Debug, Error)]
pub enum FlowError {
    // --- Not-found ---
    #[error("not a flow repository (run `flowctl init` first)")]
    NotInitialized,
    #[error("flowctl already initialized in this repository")]
    AlreadyInitialized,
    #[error("epic '{0}' not found")]
    EpicNotFound(String),
    #[error("task '{0}' not found")]
    TaskNotFound(String),
    #[error("spec file not found: {0}")]
    SpecNotFound(String),
    #[error("runtime state not found for task '{0}'")]
    RuntimeNotFound(String),
    #[error("checkpoint not found for epic '{0}'")]
    CheckpointNotFound(String),

    // --- Malformed ---
    #[error("invalid id '{0}': {1}")]
    InvalidId(String, String),
    #[error("malformed json in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported schema_version {0} (supported: {1:?})")]
    UnsupportedSchemaVersion(i64, Vec<i64>),
    #[error("duplicate heading '{0}' in spec ({1} occurrences)")]
    DuplicateHeading(String, usize),
    #[error("missing heading '{0}' in spec")]
    MissingHeading(String),
    #[error("evidence must be a JSON object with keys among commits/tests/prs")]
    InvalidEvidence,

    // --- Precondition ---
    #[error("invalid status transition: {0} -> {1}")]
    InvalidTransition(String, String),
    #[error("task '{0}' is claimed by '{1}'; use --force to override")]
    ClaimedByOther(String, String),
    #[error("dependency '{0}' of task '{1}' is not done")]
    DependencyNotDone(String, String),
    #[error("task '{0}' depends on itself")]
    SelfDependency(String),
    #[error("dependency '{0}' belongs to a different epic than task '{1}'")]
    DependencyCrossEpic(String, String),
    #[error("dependency cycle detected: {0}")]
    CycleDetected(String),
    #[error("cannot close epic '{0}': incomplete tasks: {1:?}")]
    EpicHasIncompleteTasks(String, Vec<String>),
    #[error("epic '{0}' is already closed")]
    EpicAlreadyClosed(String),
    #[error("cannot reset task '{0}': status is in_progress")]
    CannotResetInProgress(String),
    #[error("cannot reset task '{0}': owning epic is closed")]
    CannotResetClosedEpic(String),
    #[error("block reason must be non-empty")]
    EmptyBlockReason,
    #[error("epic id '{0}' collides with an existing distinct epic")]
    EpicIdCollision(String),
    #[error("id allocation overflow")]
    IdAllocationOverflow,
    #[error("refusing to overwrite existing {0}")]
    CollisionGuard(String),

    // --- Concurrency ---
    #[error("could not acquire lock on {0}: held by another process")]
    LockFailed(String),

    // --- External-tool ---
    #[error("external tool '{0}' failed: {1}")]
    ToolFailed(String, String),
    #[error("reviewer produced no verdict")]
    NoVerdict,
    #[error("vcs operation failed: {0}")]
    Vcs(String),

    // --- Sandbox ---
    #[error("reviewer blocked by sandbox policy: {0}")]
    SandboxBlocked(String),

    // --- Timeout ---
    #[error("operation timed out after {0}s")]
    Timeout(u64),

    // --- passthrough ---
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowError {
    /// Stable machine-readable error code for `{"success": false, "error": ...}` payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotInitialized => "not_initialized",
            Self::AlreadyInitialized => "already_initialized",
            Self::EpicNotFound(_) => "epic_not_found",
            Self::TaskNotFound(_) => "task_not_found",
            Self::SpecNotFound(_) => "spec_not_found",
            Self::RuntimeNotFound(_) => "runtime_not_found",
            Self::CheckpointNotFound(_) => "checkpoint_not_found",
            Self::InvalidId(_, _) => "invalid_id",
            Self::Json { .. } => "malformed_json",
            Self::UnsupportedSchemaVersion(_, _) => "unsupported_schema_version",
            Self::DuplicateHeading(_, _) => "duplicate_heading",
            Self::MissingHeading(_) => "missing_heading",
            Self::InvalidEvidence => "invalid_evidence",
            Self::InvalidTransition(_, _) => "invalid_transition",
            Self::ClaimedByOther(_, _) => "claimed_by_other",
            Self::DependencyNotDone(_, _) => "dependency_not_done",
            Self::SelfDependency(_) => "self_dependency",
            Self::DependencyCrossEpic(_, _) => "dependency_cross_epic",
            Self::CycleDetected(_) => "cycle_detected",
            Self::EpicHasIncompleteTasks(_, _) => "epic_has_incomplete_tasks",
            Self::EpicAlreadyClosed(_) => "epic_already_closed",
            Self::CannotResetInProgress(_) => "cannot_reset_in_progress",
            Self::CannotResetClosedEpic(_) => "cannot_reset_closed_epic",
            Self::EmptyBlockReason => "empty_block_reason",
            Self::EpicIdCollision(_) => "epic_id_collision",
            Self::IdAllocationOverflow => "id_allocation_overflow",
            Self::CollisionGuard(_) => "collision_guard",
            Self::LockFailed(_) => "locked",
            Self::ToolFailed(_, _) => "tool_failed",
            Self::NoVerdict => "no_verdict",
            Self::Vcs(_) => "vcs_error",
            Self::SandboxBlocked(_) => "sandbox_blocked",
            Self::Timeout(_) => "timeout",
            Self::Io(_) => "io_error",
        }
    }

    /// Which exit code class this error maps to.
    pub fn exit_class(&self) -> ExitClass {
        match self {
            Self::ToolFailed(_, _) | Self::NoVerdict | Self::Vcs(_) => ExitClass::ToolIntegration,
            Self::SandboxBlocked(_) | Self::Timeout(_) => ExitClass::Sandbox,
            _ => ExitClass::Domain,
        }
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
