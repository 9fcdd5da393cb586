use std::collections::BTreeMap;

use serde::Serialize;

use crate::checkpoint;
use crate::error::{FlowError, Result};
use crate::id::{EpicId, TaskId};
use crate::model::{Epic, MergedTask, TaskStatus};
use crate::output::{Format, emit_ok};
use crate::paths::Paths;
use crate::scheduler::{self, NextArgs};
use crate::store::{self, definition};
use crate::validate;

pub fn init(paths: &Paths, format: Format) -> Result<()> {
    definition::init(paths)?;
    let out = serde_json::json!({ "flow_dir": paths.flow_dir.display().to_string() });
    emit_ok(format, &out, |v| format!("initialized {}", v["flow_dir"].as_str().unwrap_or("")));
    Ok(())
}

#[derive(Serialize)]
struct EpicSummary {
    id: EpicId,
    title: String,
    status: crate::model::EpicStatus,
    plan_review_status: crate::model::ReviewVerdict,
    completion_review_status: crate::model::ReviewVerdict,
    todo: usize,
    in_progress: usize,
    blocked: usize,
    done: usize,
}

pub fn status(paths: &Paths, format: Format) -> Result<()> {
    definition::require_initialized(paths)?;
    let mut summaries = Vec::new();
    for epic_id in definition::list_epic_ids(paths)? {
        let epic = definition::read_epic(paths, &epic_id)?;
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for task_id in definition::list_task_ids(paths, &epic_id)? {
            let merged = store::read_merged_task(paths, &task_id)?;
            let key = match merged.runtime.status {
                TaskStatus::Todo => "todo",
                TaskStatus::InProgress => "in_progress",
                TaskStatus::Blocked => "blocked",
                TaskStatus::Done => "done",
            };
            *counts.entry(key).or_insert(0) += 1;
        }
        summaries.push(EpicSummary {
            id: epic.id.clone(),
            title: epic.title.clone(),
            status: epic.status,
            plan_review_status: epic.plan_review_status,
            completion_review_status: epic.completion_review_status,
            todo: *counts.get("todo").unwrap_or(&0),
            in_progress: *counts.get("in_progress").unwrap_or(&0),
            blocked: *counts.get("blocked").unwrap_or(&0),
            done: *counts.get("done").unwrap_or(&0),
        });
    }
    let out = serde_json::json!({ "epics": summaries });
    emit_ok(format, &out, |v| format!("{} epic(s)", v["epics"].as_array().map(|a| a.len()).unwrap_or(0)));
    Ok(())
}

/// `detect`: reports only whether this directory is a flow repository.
/// Auto-discovery of sibling "active run" directories is explicitly out of
/// scope (spec §1's non-goals) — that belongs to the orchestration harness
/// invoking flowctl, not to flowctl itself.
pub fn detect(paths: &Paths, format: Format) -> Result<()> {
    let initialized = definition::is_initialized(paths);
    let out = serde_json::json!({
        "initialized": initialized,
        "flow_dir": paths.flow_dir.display().to_string(),
        "repo_root": paths.repo_root.display().to_string(),
    });
    emit_ok(format, &out, |v| {
        format!("initialized={}", v["initialized"].as_bool().unwrap_or(false))
    });
    Ok(())
}

fn resolve_epic_or_task(id: &str) -> (Option<EpicId>, Option<TaskId>) {
    if let Ok(eid) = EpicId::parse(id) {
        (Some(eid), None)
    } else if let Ok(tid) = TaskId::parse(id) {
        (None, Some(tid))
    } else {
        (None, None)
    }
}

pub fn show(paths: &Paths, format: Format, id: &str) -> Result<()> {
    definition::require_initialized(paths)?;
    let (epic_id, task_id) = resolve_epic_or_task(id);
    if let Some(epic_id) = epic_id {
        if definition::epic_exists(paths, &epic_id) {
            let epic = definition::read_epic(paths, &epic_id)?;
            emit_ok(format, &epic, |e: &Epic| format!("{} [{:?}] {}", e.id, e.status, e.title));
            return Ok(());
        }
    }
    if let Some(task_id) = task_id {
        let merged = store::read_merged_task(paths, &task_id)?;
        emit_ok(format, &merged, |t: &MergedTask| {
            format!("{} [{}] {}", t.definition.id, t.runtime.status, t.definition.title)
        });
        return Ok(());
    }
    Err(FlowError::InvalidId(id.to_string(), "not a known epic or task id".to_string()))
}

pub fn epics(paths: &Paths, format: Format) -> Result<()> {
    definition::require_initialized(paths)?;
    let mut epics = Vec::new();
    for id in definition::list_epic_ids(paths)? {
        epics.push(definition::read_epic(paths, &id)?);
    }
    let out = serde_json::json!({ "epics": epics });
    emit_ok(format, &out, |v| format!("{} epic(s)", v["epics"].as_array().map(|a| a.len()).unwrap_or(0)));
    Ok(())
}

fn parse_status(s: &str) -> Result<TaskStatus> {
    match s.to_ascii_lowercase().replace('-', "_").as_str() {
        "todo" => Ok(TaskStatus::Todo),
        "in_progress" => Ok(TaskStatus::InProgress),
        "blocked" => Ok(TaskStatus::Blocked),
        "done" => Ok(TaskStatus::Done),
        _ => Err(FlowError::InvalidId(s.to_string(), "expected todo|in_progress|blocked|done".to_string())),
    }
}

fn collect_tasks(paths: &Paths, epic: Option<&str>, status: Option<&str>) -> Result<Vec<MergedTask>> {
    let status_filter = status.map(parse_status).transpose()?;
    let epic_ids = match epic {
        Some(e) => vec![EpicId::parse(e)?],
        None => definition::list_epic_ids(paths)?,
    };
    let mut out = Vec::new();
    for epic_id in epic_ids {
        for task_id in definition::list_task_ids(paths, &epic_id)? {
            let merged = store::read_merged_task(paths, &task_id)?;
            if status_filter.is_none_or(|s| s == merged.runtime.status) {
                out.push(merged);
            }
        }
    }
    Ok(out)
}

pub fn tasks(paths: &Paths, format: Format, epic: Option<&str>, status: Option<&str>) -> Result<()> {
    definition::require_initialized(paths)?;
    let tasks = collect_tasks(paths, epic, status)?;
    let out = serde_json::json!({ "tasks": tasks });
    emit_ok(format, &out, |v| format!("{} task(s)", v["tasks"].as_array().map(|a| a.len()).unwrap_or(0)));
    Ok(())
}

/// `list`: every task across every epic, unfiltered — the flat counterpart
/// to `tasks`' epic/status-scoped view.
pub fn list(paths: &Paths, format: Format) -> Result<()> {
    tasks(paths, format, None, None)
}

/// `cat ID`: print the raw markdown spec body for an epic or task, as
/// opposed to `show`'s structured record.
pub fn cat(paths: &Paths, format: Format, id: &str) -> Result<()> {
    definition::require_initialized(paths)?;
    let (epic_id, task_id) = resolve_epic_or_task(id);
    let content = if let Some(epic_id) = epic_id {
        definition::read_epic_spec(paths, &epic_id)?
    } else if let Some(task_id) = task_id {
        definition::read_task_spec(paths, &task_id)?
    } else {
        return Err(FlowError::InvalidId(id.to_string(), "not a known epic or task id".to_string()));
    };
    let out = serde_json::json!({ "id": id, "content": content });
    emit_ok(format, &out, |v| v["content"].as_str().unwrap_or("").to_string());
    Ok(())
}

pub fn ready(paths: &Paths, format: Format, epic: &str) -> Result<()> {
    definition::require_initialized(paths)?;
    let epic_id = EpicId::parse(epic)?;
    let set = scheduler::ready(paths, &epic_id)?;
    emit_ok(format, &set, |s| {
        format!("{} ready, {} in_progress, {} blocked", s.ready.len(), s.in_progress.len(), s.blocked.len())
    });
    Ok(())
}

pub fn next(
    paths: &Paths,
    format: Format,
    actor: &str,
    epics_file: Option<&str>,
    require_plan_review: bool,
    require_completion_review: bool,
) -> Result<()> {
    definition::require_initialized(paths)?;
    let epics: Option<Vec<EpicId>> = match epics_file {
        Some(path) => {
            let content = super::read_input(path)?;
            let ids = content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(EpicId::parse)
                .collect::<Result<Vec<_>>>()?;
            Some(ids)
        }
        None => None,
    };
    let result = scheduler::next(
        paths,
        NextArgs { epics: epics.as_deref(), require_plan_review, require_completion_review, actor },
    )?;
    emit_ok(format, &result, |r| format!("{:?}/{:?}", r.status, r.reason));
    Ok(())
}

pub fn state_path(paths: &Paths, format: Format, task: Option<&str>) -> Result<()> {
    let path = match task {
        Some(id) => {
            let task_id = TaskId::parse(id)?;
            paths.runtime_path(task_id.as_str())
        }
        None => paths.state_dir.clone(),
    };
    let out = serde_json::json!({ "path": path.display().to_string() });
    emit_ok(format, &out, |v| v["path"].as_str().unwrap_or("").to_string());
    Ok(())
}

pub fn migrate_state(paths: &Paths, format: Format, clean: bool) -> Result<()> {
    definition::require_initialized(paths)?;
    let migrated = crate::store::runtime::migrate_all(paths, clean)?;
    let out = serde_json::json!({ "migrated": migrated });
    emit_ok(format, &out, |v| format!("migrated {} task(s)", v["migrated"].as_array().map(|a| a.len()).unwrap_or(0)));
    Ok(())
}

pub fn validate(paths: &Paths, format: Format, epic: Option<&str>, all: bool) -> Result<()> {
    definition::require_initialized(paths)?;
    let report = match epic {
        Some(e) if !all => validate::validate_epic(paths, &EpicId::parse(e)?)?,
        _ => validate::validate_all(paths)?,
    };
    let ok = report.ok();
    emit_ok(format, &report, |r| {
        if r.ok() {
            "ok".to_string()
        } else {
            format!("{} error(s), {} warning(s)", r.errors.len(), r.warnings.len())
        }
    });
    if !ok {
        return Err(FlowError::ToolFailed("validate".to_string(), "validation failed".to_string()));
    }
    Ok(())
}

pub fn checkpoint_save(paths: &Paths, format: Format, epic: &str) -> Result<()> {
    definition::require_initialized(paths)?;
    let epic_id = EpicId::parse(epic)?;
    let cp = checkpoint::save(paths, &epic_id)?;
    emit_ok(format, &cp, |c| format!("saved checkpoint for {}", c.epic_id));
    Ok(())
}

pub fn checkpoint_restore(paths: &Paths, format: Format, epic: &str) -> Result<()> {
    definition::require_initialized(paths)?;
    let epic_id = EpicId::parse(epic)?;
    let cp = checkpoint::restore(paths, &epic_id)?;
    emit_ok(format, &cp, |c| format!("restored checkpoint for {}", c.epic_id));
    Ok(())
}

pub fn checkpoint_delete(paths: &Paths, format: Format, epic: &str) -> Result<()> {
    definition::require_initialized(paths)?;
    let epic_id = EpicId::parse(epic)?;
    checkpoint::delete(paths, &epic_id)?;
    let out = serde_json::json!({ "epic": epic_id.as_str() });
    emit_ok(format, &out, |v| format!("deleted checkpoint for {}", v["epic"].as_str().unwrap_or("")));
    Ok(())
}
