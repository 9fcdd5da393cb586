//! Reviewer subprocess invocation contract (spec §4.10 / §5): prompt on
//! stdin, streamed JSON events on stdout, a hard wall-clock deadline, and a
//! sandbox mode resolved from either an explicit flag or platform probing.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::error::{FlowError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum SandboxMode {
    ReadOnly,
    WorkspaceWrite,
    DangerFullAccess,
    Auto,
}

impl SandboxMode {
    /// `auto` resolves to `danger-full-access` on systems whose sandbox
    /// cannot read arbitrary files, otherwise `read-only`; `CODEX_SANDBOX`
    /// overrides this resolution only when the caller requested `auto`.
    pub fn resolve(self) -> SandboxMode {
        if self != SandboxMode::Auto {
            return self;
        }
        if let Ok(v) = std::env::var("CODEX_SANDBOX") {
            return match v.as_str() {
                "read-only" => SandboxMode::ReadOnly,
                "workspace-write" => SandboxMode::WorkspaceWrite,
                "danger-full-access" => SandboxMode::DangerFullAccess,
                _ => SandboxMode::ReadOnly,
            };
        }
        if sandbox_blocks_arbitrary_reads() {
            SandboxMode::DangerFullAccess
        } else {
            SandboxMode::ReadOnly
        }
    }

    fn as_flag(self) -> &'static str {
        match self {
            Self::ReadOnly => "read-only",
            Self::WorkspaceWrite => "workspace-write",
            Self::DangerFullAccess => "danger-full-access",
            Self::Auto => "read-only",
        }
    }
}

/// Best-effort probe: can this process read an arbitrary file outside the
/// working directory? Used only to pick the `auto` default.
fn sandbox_blocks_arbitrary_reads() -> bool {
    std::fs::read("/etc/hostname").is_err()
}

pub struct InvokeArgs<'a> {
    pub prompt: &'a str,
    pub sandbox: SandboxMode,
    pub model: Option<&'a str>,
    pub resume_session_id: Option<&'a str>,
    pub timeout_secs: u64,
}

#[derive(Debug, Default)]
pub struct InvokeOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub session_id: Option<String>,
    /// Aggregated text of any failed-item JSON events seen in the stream,
    /// used only for sandbox-failure pattern matching — never surfaced to
    /// the receipt directly.
    pub failed_item_text: String,
}

/// The external binary name. Not configurable via the command surface per
/// spec §1 (the review tool wrapper itself is out of scope); only its
/// invocation contract (stdin prompt, sandbox mode, timeout) is ours.
const REVIEWER_BIN: &str = "codex";

/// Run the reviewer subprocess with `args.prompt` on stdin and a hard
/// wall-clock deadline of `args.timeout_secs`. Returns `(stdout, session_id,
/// exit_code, stderr)` per spec §5 on success; timing out kills the process
/// and fails with [`FlowError::Timeout`].
pub fn run(args: InvokeArgs) -> Result<InvokeOutcome> {
    let sandbox = args.sandbox.resolve();

    let mut command = Command::new(REVIEWER_BIN);
    command
        .arg("exec")
        .arg("--json")
        .arg("--sandbox")
        .arg(sandbox.as_flag())
        .arg("--reasoning-effort")
        .arg("high");
    if let Some(model) = args.model {
        command.arg("--model").arg(model);
    }
    if let Some(session) = args.resume_session_id {
        command.arg("resume").arg(session);
    }
    command.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child: Child = command
        .spawn()
        .map_err(|e| FlowError::ToolFailed(REVIEWER_BIN.to_string(), format!("failed to spawn: {e}")))?;

    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(args.prompt.as_bytes());
    }

    let deadline = Instant::now() + Duration::from_secs(args.timeout_secs);
    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(FlowError::Timeout(args.timeout_secs));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(e) => return Err(FlowError::Io(e)),
        }
    }

    let mut stdout = String::new();
    if let Some(mut out) = child.stdout.take() {
        let _ = out.read_to_string(&mut stdout);
    }
    let mut stderr = String::new();
    if let Some(mut err) = child.stderr.take() {
        let _ = err.read_to_string(&mut stderr);
    }
    let exit_code = child.wait().ok().and_then(|s| s.code()).unwrap_or(-1);

    let (session_id, failed_item_text) = scan_json_events(&stdout);

    Ok(InvokeOutcome { stdout, stderr, exit_code, session_id, failed_item_text })
}

/// The reviewer streams one JSON object per line. We pull a `session_id` (or
/// `thread_id`) out of whichever event carries it, and concatenate the text
/// of any event reporting a failed item for sandbox-pattern matching. Lines
/// that don't parse as JSON (plain prose output) are ignored, not fatal.
fn scan_json_events(stdout: &str) -> (Option<String>, String) {
    let mut session_id = None;
    let mut failed_text = String::new();

    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() || !line.starts_with('{') {
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        if session_id.is_none() {
            session_id = value
                .get("session_id")
                .or_else(|| value.get("thread_id"))
                .and_then(|v| v.as_str())
                .map(str::to_string);
        }
        let is_failed = value.get("status").and_then(|v| v.as_str()) == Some("failed")
            || value.get("type").and_then(|v| v.as_str()) == Some("error");
        if is_failed {
            if let Some(text) = value.get("message").or_else(|| value.get("error")).and_then(|v| v.as_str()) {
                failed_text.push_str(text);
                failed_text.push('\n');
            } else {
                failed_text.push_str(line);
                failed_text.push('\n');
            }
        }
    }

    (session_id, failed_text)
}

/// Is the reviewer binary even on PATH? Backs the `codex check` command.
pub fn is_available() -> bool {
    Command::new(REVIEWER_BIN)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

pub fn validate_repo_relative_path(repo_root: &Path, candidate: &str) -> Result<()> {
    let p = Path::new(candidate);
    if p.is_absolute() || p.components().any(|c| c == std::path::Component::ParentDir) {
        return Err(FlowError::InvalidId(candidate.to_string(), "must be repo-relative".to_string()));
    }
    if !repo_root.join(p).exists() {
        return Err(FlowError::SpecNotFound(candidate.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_json_events_extracts_session_id() {
        let stdout = "{\"type\":\"thread.started\",\"session_id\":\"abc-123\"}\nplain text line\n";
        let (session_id, failed) = scan_json_events(stdout);
        assert_eq!(session_id.as_deref(), Some("abc-123"));
        assert!(failed.is_empty());
    }

    #[test]
    fn scan_json_events_collects_failed_item_text() {
        let stdout = "{\"type\":\"error\",\"message\":\"filesystem write is blocked\"}\n";
        let (_session, failed) = scan_json_events(stdout);
        assert!(failed.contains("filesystem write is blocked"));
    }

    #[test]
    fn non_auto_sandbox_resolves_to_itself() {
        assert_eq!(SandboxMode::ReadOnly.resolve(), SandboxMode::ReadOnly);
    }

    #[test]
    fn codex_sandbox_env_overrides_auto_resolution() {
        unsafe {
            std::env::set_var("CODEX_SANDBOX", "workspace-write");
        }
        assert_eq!(SandboxMode::Auto.resolve(), SandboxMode::WorkspaceWrite);
        unsafe {
            std::env::remove_var("CODEX_SANDBOX");
        }
    }
}
