//! Review orchestration: prompt assembly, subprocess invocation, verdict
//! parsing, and receipt continuity (spec §4.10).

pub mod context_hints;
pub mod embed;
pub mod invoke;
pub mod prompt;
pub mod receipt;
pub mod verdict;

use std::path::Path;

use crate::error::{FlowError, Result};
use crate::model::{ReceiptType, ReviewReceipt, Verdict};
use crate::paths::Paths;
use invoke::{InvokeArgs, SandboxMode};
use prompt::PromptInput;

/// Shared knobs that come from the environment or CLI flags, independent of
/// which review variant is running.
#[derive(Debug, Clone)]
pub struct ReviewConfig {
    pub mode: String,
    pub sandbox: SandboxMode,
    pub model: Option<String>,
    pub embed_max_bytes: usize,
    pub timeout_secs: u64,
}

impl ReviewConfig {
    pub fn from_env(sandbox: SandboxMode) -> Self {
        let embed_max_bytes = std::env::var("FLOW_CODEX_EMBED_MAX_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(102_400);
        let embed_max_bytes = if embed_max_bytes == 0 { usize::MAX } else { embed_max_bytes };
        Self {
            mode: "codex".to_string(),
            sandbox,
            model: std::env::var("FLOW_CODEX_MODEL").ok(),
            embed_max_bytes,
            timeout_secs: 600,
        }
    }
}

pub struct PlanReviewArgs<'a> {
    pub epic_id: &'a str,
    pub epic_spec: &'a str,
    pub task_specs: &'a str,
    pub files: &'a [String],
    pub repo_root: &'a Path,
}

pub struct ImplReviewArgs<'a> {
    pub id: &'a str,
    pub task_spec: Option<&'a str>,
    pub focus: Option<&'a str>,
    pub base: &'a str,
    pub repo_root: &'a Path,
}

pub struct CompletionReviewArgs<'a> {
    pub epic_id: &'a str,
    pub epic_spec: &'a str,
    pub task_specs: &'a str,
    pub base: &'a str,
    pub repo_root: &'a Path,
}

/// Run a plan review: embeds the explicitly supplied code paths, no diff.
pub fn plan_review(paths: &Paths, args: PlanReviewArgs, config: &ReviewConfig, receipt_path: &Path) -> Result<ReviewReceipt> {
    let (embedded, skipped) = embed::embed_explicit_files(args.repo_root, args.files, config.embed_max_bytes);
    let hints = context_hints::collect(args.repo_root, args.files);
    let input = PromptInput {
        context_hints: &hints,
        diff_summary: "",
        diff_content: "",
        diff_truncated: false,
        embedded_files: &embedded,
        embed_skips: &skipped,
        spec: args.epic_spec,
        task_specs: args.task_specs,
        instructions: prompt::PLAN_REVIEW_INSTRUCTIONS,
    };
    let built = prompt::build(&input);
    run_review(paths, ReceiptType::PlanReview, args.epic_id, &built, None, args.files, config, receipt_path)
}

/// Run an implementation review: standalone (no task id) or scoped to one
/// task's spec; diff is always included.
pub fn impl_review(paths: &Paths, args: ImplReviewArgs, config: &ReviewConfig, receipt_path: &Path) -> Result<ReviewReceipt> {
    let (diff_content, diff_truncated) = crate::vcs::diff_capped(args.repo_root, args.base, 50 * 1024);
    let changed = crate::vcs::changed_files_since(args.repo_root, args.base, "HEAD");
    let (embedded, skipped) = embed::embed_changed_files(args.repo_root, &changed, config.embed_max_bytes);
    let hints = context_hints::collect(args.repo_root, &changed);
    let diff_summary = format!("{} file(s) changed since {}", changed.len(), args.base);

    let spec = args.task_spec.unwrap_or("");
    let instructions = if args.task_spec.is_some() {
        prompt::IMPL_REVIEW_INSTRUCTIONS.to_string()
    } else {
        format!("{}\nFocus: {}", prompt::IMPL_REVIEW_INSTRUCTIONS, args.focus.unwrap_or("(none given)"))
    };
    let input = PromptInput {
        context_hints: &hints,
        diff_summary: &diff_summary,
        diff_content: &diff_content,
        diff_truncated,
        embedded_files: &embedded,
        embed_skips: &skipped,
        spec,
        task_specs: "",
        instructions: &instructions,
    };
    let built = prompt::build(&input);
    run_review(paths, ReceiptType::ImplReview, args.id, &built, Some(args.base), &changed, config, receipt_path)
}

/// Run a completion review: requirement-coverage verdict only, two-phase
/// instruction embedded in the prompt body (extract then verify).
pub fn completion_review(
    paths: &Paths,
    args: CompletionReviewArgs,
    config: &ReviewConfig,
    receipt_path: &Path,
) -> Result<ReviewReceipt> {
    let (diff_content, diff_truncated) = crate::vcs::diff_capped(args.repo_root, args.base, 50 * 1024);
    let changed = crate::vcs::changed_files_since(args.repo_root, args.base, "HEAD");
    let (embedded, skipped) = embed::embed_changed_files(args.repo_root, &changed, config.embed_max_bytes);
    let hints = context_hints::collect(args.repo_root, &changed);
    let diff_summary = format!("{} file(s) changed since {}", changed.len(), args.base);

    let input = PromptInput {
        context_hints: &hints,
        diff_summary: &diff_summary,
        diff_content: &diff_content,
        diff_truncated,
        embedded_files: &embedded,
        embed_skips: &skipped,
        spec: args.epic_spec,
        task_specs: args.task_specs,
        instructions: prompt::COMPLETION_REVIEW_INSTRUCTIONS,
    };
    let built = prompt::build(&input);
    run_review(paths, ReceiptType::CompletionReview, args.epic_id, &built, Some(args.base), &changed, config, receipt_path)
}

fn run_review(
    paths: &Paths,
    kind: ReceiptType,
    id: &str,
    built_prompt: &str,
    base: Option<&str>,
    changed_files: &[String],
    config: &ReviewConfig,
    receipt_path: &Path,
) -> Result<ReviewReceipt> {
    let _ = paths;
    let previous = receipt::read(receipt_path).ok().flatten();
    let resume_session = previous.as_ref().and_then(|r| r.session_id.clone());

    let final_prompt = if let Some(prev) = &previous {
        let file_list = if changed_files.is_empty() {
            "(none listed)".to_string()
        } else {
            changed_files.iter().map(|f| format!("- {f}")).collect::<Vec<_>>().join("\n")
        };
        format!(
            "<rereview_preamble>\nThis is a re-review. The session below is being resumed where possible. \
Do not rely on cached content from the prior pass; re-read any file you need.\nPrevious verdict: {}\nModified files since the prior review:\n{}\n</rereview_preamble>\n\n{}",
            prev.verdict.as_str(),
            file_list,
            built_prompt
        )
    } else {
        built_prompt.to_string()
    };

    let invoke_result = invoke::run(InvokeArgs {
        prompt: &final_prompt,
        sandbox: config.sandbox,
        model: config.model.as_deref(),
        resume_session_id: resume_session.as_deref(),
        timeout_secs: config.timeout_secs,
    });

    let outcome = match invoke_result {
        Ok(o) => o,
        Err(e) => {
            let _ = receipt::delete(receipt_path);
            return Err(e);
        }
    };

    if outcome.exit_code != 0 {
        if verdict::looks_sandbox_blocked(&outcome.stderr, &outcome.failed_item_text) {
            let _ = receipt::delete(receipt_path);
            return Err(FlowError::SandboxBlocked(format!(
                "reviewer exited {} under sandbox {:?}",
                outcome.exit_code, config.sandbox
            )));
        }
        let _ = receipt::delete(receipt_path);
        return Err(FlowError::ToolFailed(config.mode.clone(), format!("exit code {}", outcome.exit_code)));
    }

    let Some(parsed_verdict) = verdict::extract_verdict(&outcome.stdout) else {
        let _ = receipt::delete(receipt_path);
        return Err(FlowError::NoVerdict);
    };

    let receipt = ReviewReceipt {
        r#type: kind,
        id: id.to_string(),
        mode: config.mode.clone(),
        verdict: parsed_verdict,
        session_id: outcome.session_id.or(resume_session),
        timestamp: crate::model::now(),
        review: outcome.stdout,
        iteration: std::env::var("RALPH_ITERATION").ok().and_then(|v| v.parse().ok()),
        focus: None,
        base: base.map(|b| b.to_string()),
    };
    receipt::write(receipt_path, &receipt)?;
    Ok(receipt)
}
