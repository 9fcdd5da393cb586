use crate::error::{FlowError, Result};
use crate::id::{EpicId, TaskId};
use crate::lifecycle::{self, BackendArgs};
use crate::model::{Epic, ReviewVerdict};
use crate::output::{Format, emit_ok};
use crate::paths::Paths;
use crate::store::definition::{self, CreateEpicArgs};

fn parse_verdict(s: &str) -> Result<ReviewVerdict> {
    match s.to_ascii_lowercase().replace('-', "_").as_str() {
        "ship" => Ok(ReviewVerdict::Ship),
        "needs_work" => Ok(ReviewVerdict::NeedsWork),
        "unknown" => Ok(ReviewVerdict::Unknown),
        _ => Err(FlowError::InvalidId(s.to_string(), "expected ship|needs_work|unknown".to_string())),
    }
}

fn text_line_epic(epic: &Epic) -> String {
    format!("{} [{:?}] {}", epic.id, epic.status, epic.title)
}

pub fn create(paths: &Paths, format: Format, title: &str, branch: Option<&str>) -> Result<()> {
    definition::require_initialized(paths)?;
    let epic = definition::create_epic(paths, CreateEpicArgs { title, branch })?;
    emit_ok(format, &epic, text_line_epic);
    Ok(())
}

pub fn set_plan(paths: &Paths, format: Format, id: &str, content: &str) -> Result<()> {
    definition::require_initialized(paths)?;
    let epic_id = EpicId::parse(id)?;
    lifecycle::set_epic_plan(paths, &epic_id, content)?;
    let epic = definition::read_epic(paths, &epic_id)?;
    emit_ok(format, &epic, text_line_epic);
    Ok(())
}

pub fn set_plan_review_status(paths: &Paths, format: Format, id: &str, status: &str) -> Result<()> {
    definition::require_initialized(paths)?;
    let epic_id = EpicId::parse(id)?;
    let verdict = parse_verdict(status)?;
    let epic = lifecycle::set_plan_review_status(paths, &epic_id, verdict)?;
    emit_ok(format, &epic, text_line_epic);
    Ok(())
}

pub fn set_completion_review_status(paths: &Paths, format: Format, id: &str, status: &str) -> Result<()> {
    definition::require_initialized(paths)?;
    let epic_id = EpicId::parse(id)?;
    let verdict = parse_verdict(status)?;
    let epic = lifecycle::set_completion_review_status(paths, &epic_id, verdict)?;
    emit_ok(format, &epic, text_line_epic);
    Ok(())
}

pub fn set_branch(paths: &Paths, format: Format, id: &str, branch: &str) -> Result<()> {
    definition::require_initialized(paths)?;
    let epic_id = EpicId::parse(id)?;
    let epic = lifecycle::set_epic_branch(paths, &epic_id, branch)?;
    emit_ok(format, &epic, text_line_epic);
    Ok(())
}

pub fn set_title(paths: &Paths, format: Format, id: &str, title: &str) -> Result<()> {
    definition::require_initialized(paths)?;
    let epic_id = EpicId::parse(id)?;
    let epic = lifecycle::rename_epic(paths, &epic_id, title)?;
    emit_ok(format, &epic, text_line_epic);
    Ok(())
}

pub fn add_dep(paths: &Paths, format: Format, id: &str, dep: &str) -> Result<()> {
    definition::require_initialized(paths)?;
    let epic_id = EpicId::parse(id)?;
    let dep_id = EpicId::parse(dep)?;
    let epic = lifecycle::add_dep_epic(paths, &epic_id, dep_id)?;
    emit_ok(format, &epic, text_line_epic);
    Ok(())
}

pub fn rm_dep(paths: &Paths, format: Format, id: &str, dep: &str) -> Result<()> {
    definition::require_initialized(paths)?;
    let epic_id = EpicId::parse(id)?;
    let dep_id = EpicId::parse(dep)?;
    let epic = lifecycle::rm_dep_epic(paths, &epic_id, &dep_id)?;
    emit_ok(format, &epic, text_line_epic);
    Ok(())
}

pub fn set_backend(
    paths: &Paths,
    format: Format,
    id: &str,
    r#impl: Option<String>,
    review: Option<String>,
    sync: Option<String>,
) -> Result<()> {
    definition::require_initialized(paths)?;
    let epic_id = EpicId::parse(id)?;
    let epic = lifecycle::set_epic_backend(paths, &epic_id, BackendArgs { r#impl, review, sync })?;
    emit_ok(format, &epic, text_line_epic);
    Ok(())
}

pub fn close(paths: &Paths, format: Format, id: &str) -> Result<()> {
    definition::require_initialized(paths)?;
    let epic_id = EpicId::parse(id)?;
    let epic = lifecycle::close_epic(paths, &epic_id)?;
    emit_ok(format, &epic, text_line_epic);
    Ok(())
}

/// `dep add TASK DEP`: top-level command (not nested under `epic`/`task`)
/// adding a task-level dependency edge.
pub fn dep_add(paths: &Paths, format: Format, task: &str, dep: &str) -> Result<()> {
    definition::require_initialized(paths)?;
    let task_id = TaskId::parse(task)?;
    let dep_id = TaskId::parse(dep)?;
    let updated = lifecycle::add_dep(paths, &task_id, dep_id)?;
    emit_ok(format, &updated, |t| format!("{} now depends on {:?}", t.id, t.depends_on));
    Ok(())
}
