use crate::error::Result;
use crate::id::{EpicId, TaskId};
use crate::lifecycle::{self, BackendArgs};
use crate::model::{MergedTask, Task};
use crate::output::{Format, emit_ok};
use crate::paths::Paths;
use crate::store::{self, definition::{self, CreateTaskArgs}};

fn text_line_task(task: &Task) -> String {
    format!("{} {}", task.id, task.title)
}

fn text_line_merged(task: &MergedTask) -> String {
    format!("{} [{}] {}", task.definition.id, task.runtime.status, task.definition.title)
}

pub struct CreateArgs<'a> {
    pub epic: &'a str,
    pub title: &'a str,
    pub deps: Vec<String>,
    pub priority: Option<i64>,
    pub acceptance_file: Option<&'a str>,
}

pub fn create(paths: &Paths, format: Format, args: CreateArgs) -> Result<()> {
    definition::require_initialized(paths)?;
    let epic_id = EpicId::parse(args.epic)?;
    let deps = args.deps.iter().map(|d| TaskId::parse(d)).collect::<Result<Vec<_>>>()?;
    let acceptance = args.acceptance_file.map(super::read_input).transpose()?;
    let task = definition::create_task(
        paths,
        CreateTaskArgs {
            epic: &epic_id,
            title: args.title,
            deps,
            priority: args.priority,
            description: None,
            acceptance: acceptance.as_deref(),
        },
    )?;
    emit_ok(format, &task, text_line_task);
    Ok(())
}

pub fn set_description(paths: &Paths, format: Format, id: &str, content: &str) -> Result<()> {
    definition::require_initialized(paths)?;
    let task_id = TaskId::parse(id)?;
    lifecycle::set_task_description(paths, &task_id, content)?;
    let task = definition::read_task(paths, &task_id)?;
    emit_ok(format, &task, text_line_task);
    Ok(())
}

pub fn set_acceptance(paths: &Paths, format: Format, id: &str, content: &str) -> Result<()> {
    definition::require_initialized(paths)?;
    let task_id = TaskId::parse(id)?;
    lifecycle::set_task_acceptance(paths, &task_id, content)?;
    let task = definition::read_task(paths, &task_id)?;
    emit_ok(format, &task, text_line_task);
    Ok(())
}

pub struct SetSpecArgs<'a> {
    pub file: Option<&'a str>,
    pub description: Option<&'a str>,
    pub acceptance: Option<&'a str>,
}

pub fn set_spec(paths: &Paths, format: Format, id: &str, args: SetSpecArgs) -> Result<()> {
    definition::require_initialized(paths)?;
    let task_id = TaskId::parse(id)?;

    if let Some(file) = args.file {
        let content = super::read_input(file)?;
        lifecycle::set_task_spec_file(paths, &task_id, &content)?;
    } else {
        if let Some(file) = args.description {
            let content = super::read_input(file)?;
            lifecycle::set_task_description(paths, &task_id, &content)?;
        }
        if let Some(file) = args.acceptance {
            let content = super::read_input(file)?;
            lifecycle::set_task_acceptance(paths, &task_id, &content)?;
        }
    }

    let task = definition::read_task(paths, &task_id)?;
    emit_ok(format, &task, text_line_task);
    Ok(())
}

pub fn set_deps(paths: &Paths, format: Format, id: &str, deps: Vec<String>) -> Result<()> {
    definition::require_initialized(paths)?;
    let task_id = TaskId::parse(id)?;
    let deps = deps.iter().map(|d| TaskId::parse(d)).collect::<Result<Vec<_>>>()?;
    let task = lifecycle::set_deps(paths, &task_id, deps)?;
    emit_ok(format, &task, text_line_task);
    Ok(())
}

pub fn reset(paths: &Paths, format: Format, id: &str, cascade: bool) -> Result<()> {
    definition::require_initialized(paths)?;
    let task_id = TaskId::parse(id)?;
    let reset_ids = lifecycle::reset(paths, &task_id, cascade)?;
    emit_ok(format, &serde_json::json!({ "reset": reset_ids }), |v| {
        format!("reset {} task(s)", v["reset"].as_array().map(|a| a.len()).unwrap_or(0))
    });
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
    let task_id = TaskId::parse(id)?;
    let task = lifecycle::set_task_backend(paths, &task_id, BackendArgs { r#impl, review, sync })?;
    emit_ok(format, &task, text_line_task);
    Ok(())
}

pub fn show_backend(paths: &Paths, format: Format, id: &str) -> Result<()> {
    definition::require_initialized(paths)?;
    let task_id = TaskId::parse(id)?;
    let resolved = lifecycle::show_task_backend(paths, &task_id)?;
    let value = serde_json::json!({
        "impl": resolved.r#impl,
        "review": resolved.review,
        "sync": resolved.sync,
    });
    emit_ok(format, &value, |v| {
        format!(
            "impl={} review={} sync={}",
            v["impl"].as_str().unwrap_or("(none)"),
            v["review"].as_str().unwrap_or("(none)"),
            v["sync"].as_str().unwrap_or("(none)")
        )
    });
    Ok(())
}

pub fn start(paths: &Paths, format: Format, id: &str, actor: &str, force: bool, note: Option<&str>) -> Result<()> {
    definition::require_initialized(paths)?;
    let task_id = TaskId::parse(id)?;
    let merged = lifecycle::start(paths, &task_id, actor, force, note)?;
    emit_ok(format, &merged, text_line_merged);
    Ok(())
}

pub struct DoneArgs<'a> {
    pub summary: &'a str,
    pub evidence_json: Option<&'a str>,
    pub force: bool,
}

pub fn done(paths: &Paths, format: Format, id: &str, actor: &str, args: DoneArgs) -> Result<()> {
    definition::require_initialized(paths)?;
    let task_id = TaskId::parse(id)?;
    let evidence = match args.evidence_json {
        Some(raw) => lifecycle::parse_evidence_json(raw)?,
        None => crate::model::Evidence::default(),
    };
    let merged = lifecycle::done(paths, &task_id, actor, args.summary, evidence, args.force)?;
    emit_ok(format, &merged, text_line_merged);
    Ok(())
}

pub fn block(paths: &Paths, format: Format, id: &str, reason: &str) -> Result<()> {
    definition::require_initialized(paths)?;
    let task_id = TaskId::parse(id)?;
    let merged = lifecycle::block(paths, &task_id, reason)?;
    emit_ok(format, &merged, text_line_merged);
    Ok(())
}

pub fn show(paths: &Paths, format: Format, id: &str) -> Result<()> {
    definition::require_initialized(paths)?;
    let task_id = TaskId::parse(id)?;
    let merged = store::read_merged_task(paths, &task_id)?;
    emit_ok(format, &merged, text_line_merged);
    Ok(())
}
