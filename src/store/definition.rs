use std::collections::BTreeSet;
use std::fs;

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};
use crate::id::{EpicId, TaskId, derive_slug};
use crate::io;
use crate::model::{Epic, EpicStatus, ReviewVerdict, Task, now};
use crate::paths::Paths;

pub const SUPPORTED_SCHEMA_VERSIONS: &[i64] = &[1, 2];
const CURRENT_SCHEMA_VERSION: i64 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub schema_version: i64,
    /// Legacy informational field from the original counter-based
    /// allocator. Scan-based allocation (spec §4.3) is authoritative; this
    /// is never read by any operation, only preserved round-trip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_epic: Option<u64>,
}

const TASK_SPEC_TEMPLATE: &str = "## Description\n\nTBD\n\n## Acceptance\n\nTBD\n\n## Done summary\n\nTBD\n\n## Evidence\n\n- Commits:\n- Tests:\n- PRs:\n";

pub fn is_initialized(paths: &Paths) -> bool {
    paths.meta_path().exists()
}

pub fn init(paths: &Paths) -> Result<()> {
    if is_initialized(paths) {
        return Err(FlowError::AlreadyInitialized);
    }
    fs::create_dir_all(paths.epics_dir())?;
    fs::create_dir_all(paths.specs_dir())?;
    fs::create_dir_all(paths.tasks_dir())?;
    fs::create_dir_all(paths.memory_dir())?;
    io::write_json_atomic(
        &paths.meta_path(),
        &Meta {
            schema_version: CURRENT_SCHEMA_VERSION,
            next_epic: Some(1),
        },
    )
}

pub fn read_meta(paths: &Paths) -> Result<Meta> {
    if !is_initialized(paths) {
        return Err(FlowError::NotInitialized);
    }
    let meta: Meta = io::read_json(&paths.meta_path())?;
    if !SUPPORTED_SCHEMA_VERSIONS.contains(&meta.schema_version) {
        return Err(FlowError::UnsupportedSchemaVersion(
            meta.schema_version,
            SUPPORTED_SCHEMA_VERSIONS.to_vec(),
        ));
    }
    Ok(meta)
}

pub fn require_initialized(paths: &Paths) -> Result<()> {
    read_meta(paths).map(|_| ())
}

fn epic_num_from_filename(stem: &str) -> Option<u64> {
    EpicId::parse(stem).ok().map(|id| id.num())
}

/// Union candidates from both `epics/` and `specs/` to catch orphan specs,
/// per spec §9.
pub fn scan_max_epic_num(paths: &Paths) -> u64 {
    let mut max = 0u64;
    for dir in [paths.epics_dir(), paths.specs_dir()] {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some(num) = epic_num_from_filename(stem) {
                max = max.max(num);
            }
        }
    }
    max
}

pub fn scan_max_task_num(paths: &Paths, epic: &EpicId) -> u64 {
    let mut max = 0u64;
    let Ok(entries) = fs::read_dir(paths.tasks_dir()) else {
        return 0;
    };
    let prefix = format!("{}.", epic.as_str());
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Some(rest) = stem.strip_prefix(&prefix) {
            if let Ok(n) = rest.parse::<u64>() {
                max = max.max(n);
            }
        }
    }
    max
}

pub fn list_epic_ids(paths: &Paths) -> Result<Vec<EpicId>> {
    let mut ids = BTreeSet::new();
    for dir in [paths.epics_dir(), paths.specs_dir()] {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if let Ok(id) = EpicId::parse(stem) {
                    ids.insert(id.as_str().to_string());
                }
            }
        }
    }
    let mut parsed: Vec<EpicId> = ids.iter().filter_map(|s| EpicId::parse(s).ok()).collect();
    parsed.sort_by_key(|e| e.num());
    Ok(parsed)
}

pub fn list_task_ids(paths: &Paths, epic: &EpicId) -> Result<Vec<TaskId>> {
    let mut ids = Vec::new();
    let Ok(entries) = fs::read_dir(paths.tasks_dir()) else {
        return Ok(ids);
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            if let Ok(id) = TaskId::parse(stem) {
                if id.epic_of().as_str() == epic.as_str() {
                    ids.push(id);
                }
            }
        }
    }
    ids.sort_by_key(|t| t.sort_key());
    Ok(ids)
}

fn epic_json_path(paths: &Paths, id: &EpicId) -> std::path::PathBuf {
    paths.epics_dir().join(format!("{}.json", id.as_str()))
}

fn epic_spec_path(paths: &Paths, id: &EpicId) -> std::path::PathBuf {
    paths.specs_dir().join(format!("{}.md", id.as_str()))
}

fn task_json_path(paths: &Paths, id: &TaskId) -> std::path::PathBuf {
    paths.tasks_dir().join(format!("{}.json", id.as_str()))
}

fn task_spec_path(paths: &Paths, id: &TaskId) -> std::path::PathBuf {
    paths.tasks_dir().join(format!("{}.md", id.as_str()))
}

pub fn epic_exists(paths: &Paths, id: &EpicId) -> bool {
    epic_json_path(paths, id).exists() || epic_spec_path(paths, id).exists()
}

pub fn epic_json_exists(paths: &Paths, id: &EpicId) -> bool {
    epic_json_path(paths, id).exists()
}

pub fn task_exists(paths: &Paths, id: &TaskId) -> bool {
    task_json_path(paths, id).exists() || task_spec_path(paths, id).exists()
}

pub fn read_epic(paths: &Paths, id: &EpicId) -> Result<Epic> {
    let path = epic_json_path(paths, id);
    if !path.exists() {
        return Err(FlowError::EpicNotFound(id.as_str().to_string()));
    }
    io::read_json(&path)
}

pub fn write_epic(paths: &Paths, epic: &Epic) -> Result<()> {
    io::write_json_atomic(&epic_json_path(paths, &epic.id), epic)
}

pub fn read_epic_spec(paths: &Paths, id: &EpicId) -> Result<String> {
    let path = epic_spec_path(paths, id);
    if !path.exists() {
        return Err(FlowError::SpecNotFound(path.display().to_string()));
    }
    Ok(fs::read_to_string(path)?)
}

pub fn write_epic_spec(paths: &Paths, id: &EpicId, content: &str) -> Result<()> {
    io::write_text_atomic(&epic_spec_path(paths, id), content)
}

pub fn read_task(paths: &Paths, id: &TaskId) -> Result<Task> {
    let path = task_json_path(paths, id);
    if !path.exists() {
        return Err(FlowError::TaskNotFound(id.as_str().to_string()));
    }
    io::read_json(&path)
}

/// Writes the definition JSON only, stripping runtime-only fields per spec
/// §4.3: legacy fields are never re-persisted by a fresh write.
pub fn write_task(paths: &Paths, task: &Task) -> Result<()> {
    let mut clean = task.clone();
    clean.legacy_runtime = Default::default();
    io::write_json_atomic(&task_json_path(paths, &task.id), &clean)
}

/// Writes the definition JSON preserving whatever legacy runtime fields are
/// already present — used only by the migration/backward-compat path.
pub fn write_task_preserving_legacy(paths: &Paths, task: &Task) -> Result<()> {
    io::write_json_atomic(&task_json_path(paths, &task.id), task)
}

pub fn read_task_spec(paths: &Paths, id: &TaskId) -> Result<String> {
    let path = task_spec_path(paths, id);
    if !path.exists() {
        return Err(FlowError::SpecNotFound(path.display().to_string()));
    }
    Ok(fs::read_to_string(path)?)
}

pub fn write_task_spec(paths: &Paths, id: &TaskId, content: &str) -> Result<()> {
    io::write_text_atomic(&task_spec_path(paths, id), content)
}

pub struct CreateEpicArgs<'a> {
    pub title: &'a str,
    pub branch: Option<&'a str>,
}

pub fn create_epic(paths: &Paths, args: CreateEpicArgs) -> Result<Epic> {
    let num = scan_max_epic_num(paths) + 1;
    let slug = derive_slug(args.title);
    let id = EpicId::compose(num, Some(&slug));
    if epic_exists(paths, &id) {
        return Err(FlowError::CollisionGuard(id.as_str().to_string()));
    }
    let ts = now();
    let epic = Epic {
        id: id.clone(),
        title: args.title.to_string(),
        status: EpicStatus::Open,
        plan_review_status: ReviewVerdict::Unknown,
        plan_reviewed_at: None,
        completion_review_status: ReviewVerdict::Unknown,
        completion_reviewed_at: None,
        branch_name: args.branch.map(|s| s.to_string()),
        depends_on_epics: Vec::new(),
        spec_path: format!(".flow/specs/{}.md", id.as_str()),
        default_impl: None,
        default_review: None,
        default_sync: None,
        created_at: ts,
        updated_at: ts,
    };
    write_epic(paths, &epic)?;
    write_epic_spec(paths, &id, &format!("# {}\n\nTBD\n", args.title))?;
    Ok(epic)
}

pub struct CreateTaskArgs<'a> {
    pub epic: &'a EpicId,
    pub title: &'a str,
    pub deps: Vec<TaskId>,
    pub priority: Option<i64>,
    pub description: Option<&'a str>,
    pub acceptance: Option<&'a str>,
}

pub fn create_task(paths: &Paths, args: CreateTaskArgs) -> Result<Task> {
    if !epic_exists(paths, args.epic) {
        return Err(FlowError::EpicNotFound(args.epic.as_str().to_string()));
    }
    let num = scan_max_task_num(paths, args.epic) + 1;
    let id = TaskId::compose(args.epic, num);
    if task_exists(paths, &id) {
        return Err(FlowError::CollisionGuard(id.as_str().to_string()));
    }
    for dep in &args.deps {
        if dep.epic_of().as_str() != args.epic.as_str() {
            return Err(FlowError::DependencyCrossEpic(dep.as_str().to_string(), id.as_str().to_string()));
        }
        if dep.as_str() == id.as_str() {
            return Err(FlowError::SelfDependency(id.as_str().to_string()));
        }
    }
    let ts = now();
    let task = Task {
        id: id.clone(),
        epic: args.epic.clone(),
        title: args.title.to_string(),
        priority: args.priority,
        depends_on: args.deps,
        spec_path: format!(".flow/tasks/{}.md", id.as_str()),
        r#impl: None,
        review: None,
        sync: None,
        created_at: ts,
        updated_at: ts,
        legacy_runtime: Default::default(),
    };
    write_task(paths, &task)?;
    let spec = build_task_spec(args.title, args.description, args.acceptance);
    write_task_spec(paths, &id, &spec)?;
    Ok(task)
}

fn build_task_spec(title: &str, description: Option<&str>, acceptance: Option<&str>) -> String {
    let description = description.unwrap_or("TBD");
    let acceptance = acceptance.unwrap_or("TBD");
    format!(
        "# {title}\n\n## Description\n\n{description}\n\n## Acceptance\n\n{acceptance}\n\n## Done summary\n\nTBD\n\n## Evidence\n\n- Commits:\n- Tests:\n- PRs:\n"
    )
}

pub fn default_task_spec_template() -> &'static str {
    TASK_SPEC_TEMPLATE
}
