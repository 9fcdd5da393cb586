use std::path::PathBuf;

use crate::error::Result;
use crate::id::{EpicId, TaskId};
use crate::output::{Format, emit_ok};
use crate::paths::Paths;
use crate::review::invoke::SandboxMode;
use crate::review::{self, CompletionReviewArgs, ImplReviewArgs, PlanReviewArgs, ReviewConfig};
use crate::store::definition;

pub fn check(format: Format) -> Result<()> {
    let available = crate::review::invoke::is_available();
    let out = serde_json::json!({ "available": available });
    emit_ok(format, &out, |v| {
        if v["available"].as_bool().unwrap_or(false) { "available".to_string() } else { "not available".to_string() }
    });
    Ok(())
}

fn default_receipt_path(paths: &Paths, kind: &str, id: &str) -> PathBuf {
    paths.memory_dir().join(format!("receipt-{kind}-{id}.json"))
}

fn concat_task_specs(paths: &Paths, epic_id: &EpicId) -> Result<String> {
    let mut out = String::new();
    for task_id in definition::list_task_ids(paths, epic_id)? {
        let spec = definition::read_task_spec(paths, &task_id)?;
        out.push_str(&format!("### {}\n\n{}\n\n", task_id.as_str(), spec));
    }
    Ok(out)
}

pub fn plan_review(
    paths: &Paths,
    format: Format,
    epic: &str,
    files: Vec<String>,
    base: &str,
    receipt: Option<&str>,
    sandbox: SandboxMode,
) -> Result<()> {
    definition::require_initialized(paths)?;
    let epic_id = EpicId::parse(epic)?;
    let epic_spec = definition::read_epic_spec(paths, &epic_id)?;
    let task_specs = concat_task_specs(paths, &epic_id)?;
    for f in &files {
        crate::review::invoke::validate_repo_relative_path(&paths.repo_root, f)?;
    }
    let config = ReviewConfig::from_env(sandbox.resolve());
    let receipt_path = receipt.map(PathBuf::from).unwrap_or_else(|| default_receipt_path(paths, "plan", epic_id.as_str()));

    let result = review::plan_review(
        paths,
        PlanReviewArgs { epic_id: epic_id.as_str(), epic_spec: &epic_spec, task_specs: &task_specs, files: &files, repo_root: &paths.repo_root },
        &config,
        &receipt_path,
    );
    let _ = base;
    let receipt = result?;
    emit_ok(format, &receipt, |r| format!("{}: {:?}", r.id, r.verdict));
    Ok(())
}

pub fn impl_review(
    paths: &Paths,
    format: Format,
    task: Option<&str>,
    focus: Option<&str>,
    base: &str,
    receipt: Option<&str>,
    sandbox: SandboxMode,
) -> Result<()> {
    definition::require_initialized(paths)?;
    let (id, task_spec) = match task {
        Some(t) => {
            let task_id = TaskId::parse(t)?;
            let spec = definition::read_task_spec(paths, &task_id)?;
            (t.to_string(), Some(spec))
        }
        None => ("standalone".to_string(), None),
    };
    let config = ReviewConfig::from_env(sandbox.resolve());
    let receipt_path = receipt.map(PathBuf::from).unwrap_or_else(|| default_receipt_path(paths, "impl", &id));

    let result = review::impl_review(
        paths,
        ImplReviewArgs { id: &id, task_spec: task_spec.as_deref(), focus, base, repo_root: &paths.repo_root },
        &config,
        &receipt_path,
    )?;
    emit_ok(format, &result, |r| format!("{}: {:?}", r.id, r.verdict));
    Ok(())
}

pub fn completion_review(
    paths: &Paths,
    format: Format,
    epic: &str,
    base: &str,
    receipt: Option<&str>,
    sandbox: SandboxMode,
) -> Result<()> {
    definition::require_initialized(paths)?;
    let epic_id = EpicId::parse(epic)?;
    let epic_spec = definition::read_epic_spec(paths, &epic_id)?;
    let task_specs = concat_task_specs(paths, &epic_id)?;
    let config = ReviewConfig::from_env(sandbox.resolve());
    let receipt_path = receipt.map(PathBuf::from).unwrap_or_else(|| default_receipt_path(paths, "completion", epic_id.as_str()));

    let result = review::completion_review(
        paths,
        CompletionReviewArgs { epic_id: epic_id.as_str(), epic_spec: &epic_spec, task_specs: &task_specs, base, repo_root: &paths.repo_root },
        &config,
        &receipt_path,
    )?;
    emit_ok(format, &result, |r| format!("{}: {:?}", r.id, r.verdict));
    Ok(())
}
