//! Status transitions, soft-claim semantics, and dependency edits (spec §4.6).

use serde_json::Value;

use crate::error::{FlowError, Result};
use crate::id::{EpicId, TaskId};
use crate::model::{Epic, EpicStatus, Evidence, MergedTask, Task, TaskStatus, now};
use crate::paths::Paths;
use crate::spec_patch;
use crate::store;
use crate::store::definition;
use crate::store::runtime as runtime_store;

fn is_claimed_by_other(merged: &MergedTask, actor: &str) -> bool {
    matches!(&merged.runtime.assignee, Some(a) if a != actor)
}

/// `start(task, force?, note?)` per spec §4.6.
pub fn start(paths: &Paths, task_id: &TaskId, actor: &str, force: bool, note: Option<&str>) -> Result<MergedTask> {
    let task = definition::read_task(paths, task_id)?;

    if !force {
        for dep in &task.depends_on {
            let dep_merged = store::read_merged_task(paths, dep)?;
            if dep_merged.runtime.status != TaskStatus::Done {
                return Err(FlowError::DependencyNotDone(dep.as_str().to_string(), task_id.as_str().to_string()));
            }
        }
    }

    runtime_store::with_lock(paths, task_id, || {
        let merged = store::read_merged_task_from(paths, &task)?;

        if merged.runtime.status == TaskStatus::Done {
            return Err(FlowError::InvalidTransition("done".into(), "in_progress".into()));
        }
        if merged.runtime.status == TaskStatus::Blocked && !force {
            return Err(FlowError::InvalidTransition("blocked".into(), "in_progress".into()));
        }
        let is_resuming_own_claim =
            merged.runtime.status == TaskStatus::InProgress && merged.runtime.assignee.as_deref() == Some(actor);
        if is_claimed_by_other(&merged, actor) && !force {
            return Err(FlowError::ClaimedByOther(
                task_id.as_str().to_string(),
                merged.runtime.assignee.clone().unwrap_or_default(),
            ));
        }
        if merged.runtime.status != TaskStatus::Todo && !is_resuming_own_claim && !force {
            return Err(FlowError::InvalidTransition(merged.runtime.status.to_string(), "in_progress".into()));
        }

        let took_over = force
            && merged.runtime.status != TaskStatus::Todo
            && merged.runtime.assignee.as_deref() != Some(actor);
        let prev_assignee = merged.runtime.assignee.clone();

        let updated = runtime_store::save_runtime(paths, task_id, |state| {
            state.status = TaskStatus::InProgress;
            if took_over {
                state.assignee = Some(actor.to_string());
                state.claimed_at = Some(now());
                state.claim_note = note
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| format!("Taken over from {}", prev_assignee.clone().unwrap_or_default()));
            } else {
                if state.assignee.is_none() {
                    state.assignee = Some(actor.to_string());
                    state.claimed_at = Some(now());
                }
                if let Some(n) = note {
                    state.claim_note = n.to_string();
                }
            }
        })?;

        Ok(crate::model::merge(&task, Some(updated)))
    })
}

/// Parse an evidence JSON object per spec §4.6: a bare string value for
/// `commits`/`tests`/`prs` is promoted to a one-element list.
pub fn parse_evidence_json(raw: &str) -> Result<Evidence> {
    let value: Value = serde_json::from_str(raw).map_err(|_| FlowError::InvalidEvidence)?;
    let Value::Object(map) = value else {
        return Err(FlowError::InvalidEvidence);
    };
    let to_list = |v: Option<&Value>| -> Result<Vec<String>> {
        match v {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::String(s)) => Ok(vec![s.clone()]),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string).ok_or(FlowError::InvalidEvidence))
                .collect(),
            _ => Err(FlowError::InvalidEvidence),
        }
    };
    Ok(Evidence {
        commits: to_list(map.get("commits"))?,
        tests: to_list(map.get("tests"))?,
        prs: to_list(map.get("prs"))?,
    })
}

/// `done(task, summary, evidence, force?)` per spec §4.6. All spec patches
/// must succeed before anything is written (the spec is written once, then
/// the runtime is updated).
pub fn done(
    paths: &Paths,
    task_id: &TaskId,
    actor: &str,
    summary: &str,
    evidence: Evidence,
    force: bool,
) -> Result<MergedTask> {
    let task = definition::read_task(paths, task_id)?;

    runtime_store::with_lock(paths, task_id, || {
        let merged = store::read_merged_task_from(paths, &task)?;
        if merged.runtime.status == TaskStatus::Done {
            return Err(FlowError::InvalidTransition("done".into(), "done".into()));
        }
        if merged.runtime.status != TaskStatus::InProgress {
            return Err(FlowError::InvalidTransition(merged.runtime.status.to_string(), "done".into()));
        }
        if !force && is_claimed_by_other(&merged, actor) {
            return Err(FlowError::ClaimedByOther(
                task_id.as_str().to_string(),
                merged.runtime.assignee.clone().unwrap_or_default(),
            ));
        }

        let spec = definition::read_task_spec(paths, task_id)?;
        let rendered_evidence = spec_patch::render_evidence(&evidence);
        let with_summary = spec_patch::patch_section(&spec, "## Done summary", summary)?;
        let patched = spec_patch::patch_section(&with_summary, "## Evidence", &rendered_evidence)?;
        definition::write_task_spec(paths, task_id, &patched)?;

        let updated = runtime_store::save_runtime(paths, task_id, |state| {
            state.status = TaskStatus::Done;
            state.evidence = evidence.clone();
        })?;
        Ok(crate::model::merge(&task, Some(updated)))
    })
}

/// `block(task, reason)` per spec §4.6: append the reason into `## Done
/// summary`, replacing blank/TBD bodies outright and appending to non-empty
/// ones under a `Blocked:` header.
pub fn block(paths: &Paths, task_id: &TaskId, reason: &str) -> Result<MergedTask> {
    if reason.trim().is_empty() {
        return Err(FlowError::EmptyBlockReason);
    }
    let task = definition::read_task(paths, task_id)?;

    runtime_store::with_lock(paths, task_id, || {
        let merged = store::read_merged_task_from(paths, &task)?;
        if merged.runtime.status == TaskStatus::Done {
            return Err(FlowError::InvalidTransition("done".into(), "blocked".into()));
        }

        let spec = definition::read_task_spec(paths, task_id)?;
        let existing = spec_patch::get_section(&spec, "## Done summary").unwrap_or_default();
        let new_body = if existing.is_empty() || existing == "TBD" {
            format!("Blocked: {reason}")
        } else {
            format!("{existing}\n\nBlocked: {reason}")
        };
        let patched = spec_patch::patch_section(&spec, "## Done summary", &new_body)?;
        definition::write_task_spec(paths, task_id, &patched)?;

        let updated = runtime_store::save_runtime(paths, task_id, |state| {
            state.status = TaskStatus::Blocked;
            state.blocked_reason = Some(reason.to_string());
        })?;
        Ok(crate::model::merge(&task, Some(updated)))
    })
}

/// Reset a single task's runtime and definition hygiene fields, and clear
/// its spec's `## Evidence` body and any `Blocked: …` text left in
/// `## Done summary` by a prior `block()`. Does not check preconditions —
/// callers (`reset`) check those once up front.
fn reset_one(paths: &Paths, task_id: &TaskId) -> Result<()> {
    runtime_store::with_lock(paths, task_id, || {
        runtime_store::reset_runtime(paths, task_id)?;

        let mut task = definition::read_task(paths, task_id)?;
        if !task.legacy_runtime.is_empty() {
            task.legacy_runtime = Default::default();
            definition::write_task(paths, &task)?;
        }

        let spec = definition::read_task_spec(paths, task_id)?;
        let cleared = spec_patch::clear_evidence(&spec)?;
        let cleared = spec_patch::clear_done_summary(&cleared)?;
        definition::write_task_spec(paths, task_id, &cleared)?;
        Ok(())
    })
}

/// `reset(task, cascade?)` per spec §4.6.
pub fn reset(paths: &Paths, task_id: &TaskId, cascade: bool) -> Result<Vec<TaskId>> {
    let task = definition::read_task(paths, task_id)?;
    let epic = definition::read_epic(paths, &task.epic)?;
    if epic.status == EpicStatus::Done {
        return Err(FlowError::CannotResetClosedEpic(task_id.as_str().to_string()));
    }

    let merged = store::read_merged_task_from(paths, &task)?;
    if merged.runtime.status == TaskStatus::InProgress {
        return Err(FlowError::CannotResetInProgress(task_id.as_str().to_string()));
    }
    if merged.runtime.status == TaskStatus::Todo {
        return Ok(Vec::new());
    }

    reset_one(paths, task_id)?;
    let mut reset_ids = vec![task_id.clone()];

    if cascade {
        let adjacency = crate::validate::build_dependency_adjacency(paths, &task.epic)?;
        for other_id in definition::list_task_ids(paths, &task.epic)? {
            if &other_id == task_id {
                continue;
            }
            if !crate::validate::has_path(&adjacency, &other_id, task_id) {
                continue;
            }
            let other_merged = store::read_merged_task(paths, &other_id)?;
            if matches!(other_merged.runtime.status, TaskStatus::Todo | TaskStatus::InProgress) {
                continue;
            }
            reset_one(paths, &other_id)?;
            reset_ids.push(other_id);
        }
    }

    Ok(reset_ids)
}

/// `set-deps` is additive and deduplicating: it unions `deps` into the
/// task's existing `depends_on` rather than replacing it wholesale.
pub fn set_deps(paths: &Paths, task_id: &TaskId, deps: Vec<TaskId>) -> Result<Task> {
    let mut task = definition::read_task(paths, task_id)?;
    let adjacency = crate::validate::build_dependency_adjacency(paths, &task.epic)?;

    let mut merged_deps = task.depends_on.clone();
    for dep in deps {
        if dep.epic_of().as_str() != task.epic.as_str() {
            return Err(FlowError::DependencyCrossEpic(dep.as_str().to_string(), task_id.as_str().to_string()));
        }
        crate::validate::validate_dependency_plan(task_id, std::slice::from_ref(&dep), &adjacency)?;
        if !merged_deps.contains(&dep) {
            merged_deps.push(dep);
        }
    }
    task.depends_on = merged_deps;
    task.updated_at = now();
    definition::write_task(paths, &task)?;
    Ok(task)
}

pub fn add_dep(paths: &Paths, task_id: &TaskId, dep: TaskId) -> Result<Task> {
    set_deps(paths, task_id, vec![dep])
}

pub fn rm_dep(paths: &Paths, task_id: &TaskId, dep: &TaskId) -> Result<Task> {
    let mut task = definition::read_task(paths, task_id)?;
    task.depends_on.retain(|d| d != dep);
    task.updated_at = now();
    definition::write_task(paths, &task)?;
    Ok(task)
}

pub fn add_dep_epic(paths: &Paths, epic_id: &EpicId, dep: EpicId) -> Result<Epic> {
    if &dep == epic_id {
        return Err(FlowError::SelfDependency(epic_id.as_str().to_string()));
    }
    if !definition::epic_exists(paths, &dep) {
        return Err(FlowError::EpicNotFound(dep.as_str().to_string()));
    }
    let mut epic = definition::read_epic(paths, epic_id)?;
    if !epic.depends_on_epics.contains(&dep) {
        epic.depends_on_epics.push(dep);
    }
    epic.updated_at = now();
    definition::write_epic(paths, &epic)?;
    Ok(epic)
}

pub fn rm_dep_epic(paths: &Paths, epic_id: &EpicId, dep: &EpicId) -> Result<Epic> {
    let mut epic = definition::read_epic(paths, epic_id)?;
    epic.depends_on_epics.retain(|d| d != dep);
    epic.updated_at = now();
    definition::write_epic(paths, &epic)?;
    Ok(epic)
}

pub fn set_epic_branch(paths: &Paths, epic_id: &EpicId, branch: &str) -> Result<Epic> {
    let mut epic = definition::read_epic(paths, epic_id)?;
    epic.branch_name = Some(branch.to_string());
    epic.updated_at = now();
    definition::write_epic(paths, &epic)?;
    Ok(epic)
}

pub fn set_epic_plan(paths: &Paths, epic_id: &EpicId, content: &str) -> Result<()> {
    definition::write_epic_spec(paths, epic_id, content)
}

pub fn set_plan_review_status(paths: &Paths, epic_id: &EpicId, status: crate::model::ReviewVerdict) -> Result<Epic> {
    let mut epic = definition::read_epic(paths, epic_id)?;
    epic.plan_review_status = status;
    epic.plan_reviewed_at = Some(now());
    epic.updated_at = now();
    definition::write_epic(paths, &epic)?;
    Ok(epic)
}

pub fn set_completion_review_status(paths: &Paths, epic_id: &EpicId, status: crate::model::ReviewVerdict) -> Result<Epic> {
    let mut epic = definition::read_epic(paths, epic_id)?;
    epic.completion_review_status = status;
    epic.completion_reviewed_at = Some(now());
    epic.updated_at = now();
    definition::write_epic(paths, &epic)?;
    Ok(epic)
}

pub struct BackendArgs {
    pub r#impl: Option<String>,
    pub review: Option<String>,
    pub sync: Option<String>,
}

pub fn set_epic_backend(paths: &Paths, epic_id: &EpicId, args: BackendArgs) -> Result<Epic> {
    let mut epic = definition::read_epic(paths, epic_id)?;
    if let Some(v) = args.r#impl {
        epic.default_impl = Some(v);
    }
    if let Some(v) = args.review {
        epic.default_review = Some(v);
    }
    if let Some(v) = args.sync {
        epic.default_sync = Some(v);
    }
    epic.updated_at = now();
    definition::write_epic(paths, &epic)?;
    Ok(epic)
}

pub fn set_task_backend(paths: &Paths, task_id: &TaskId, args: BackendArgs) -> Result<Task> {
    let mut task = definition::read_task(paths, task_id)?;
    if let Some(v) = args.r#impl {
        task.r#impl = Some(v);
    }
    if let Some(v) = args.review {
        task.review = Some(v);
    }
    if let Some(v) = args.sync {
        task.sync = Some(v);
    }
    task.updated_at = now();
    definition::write_task(paths, &task)?;
    Ok(task)
}

/// Resolved backend triple for a task: its own override, falling back to the
/// owning epic's default per field.
pub struct ResolvedBackend {
    pub r#impl: Option<String>,
    pub review: Option<String>,
    pub sync: Option<String>,
}

pub fn show_task_backend(paths: &Paths, task_id: &TaskId) -> Result<ResolvedBackend> {
    let task = definition::read_task(paths, task_id)?;
    let epic = definition::read_epic(paths, &task.epic)?;
    Ok(ResolvedBackend {
        r#impl: task.r#impl.or(epic.default_impl),
        review: task.review.or(epic.default_review),
        sync: task.sync.or(epic.default_sync),
    })
}

/// `task set-description` / `set-acceptance`: patch a single spec section
/// without touching the rest of the file.
pub fn set_task_description(paths: &Paths, task_id: &TaskId, content: &str) -> Result<()> {
    patch_task_section(paths, task_id, "## Description", content)
}

pub fn set_task_acceptance(paths: &Paths, task_id: &TaskId, content: &str) -> Result<()> {
    patch_task_section(paths, task_id, "## Acceptance", content)
}

fn patch_task_section(paths: &Paths, task_id: &TaskId, heading: &str, content: &str) -> Result<()> {
    let spec = definition::read_task_spec(paths, task_id)?;
    let patched = spec_patch::patch_section(&spec, heading, content)?;
    definition::write_task_spec(paths, task_id, &patched)?;
    let mut task = definition::read_task(paths, task_id)?;
    task.updated_at = now();
    definition::write_task(paths, &task)?;
    Ok(())
}

/// `task set-spec --file F`: replace the whole spec file wholesale, but only
/// after confirming it still carries every required heading exactly once.
pub fn set_task_spec_file(paths: &Paths, task_id: &TaskId, content: &str) -> Result<()> {
    spec_patch::validate_task_spec_headings(content)?;
    definition::write_task_spec(paths, task_id, content)?;
    let mut task = definition::read_task(paths, task_id)?;
    task.updated_at = now();
    definition::write_task(paths, &task)?;
    Ok(())
}

/// `epic close`: requires every child task to have merged status = done.
pub fn close_epic(paths: &Paths, epic_id: &EpicId) -> Result<Epic> {
    let mut epic = definition::read_epic(paths, epic_id)?;
    if epic.status == EpicStatus::Done {
        return Err(FlowError::EpicAlreadyClosed(epic_id.as_str().to_string()));
    }

    let mut incomplete = Vec::new();
    for task_id in definition::list_task_ids(paths, epic_id)? {
        let merged = store::read_merged_task(paths, &task_id)?;
        if merged.runtime.status != TaskStatus::Done {
            incomplete.push(task_id.as_str().to_string());
        }
    }
    if !incomplete.is_empty() {
        return Err(FlowError::EpicHasIncompleteTasks(epic_id.as_str().to_string(), incomplete));
    }

    epic.status = EpicStatus::Done;
    epic.updated_at = now();
    definition::write_epic(paths, &epic)?;
    Ok(epic)
}

/// `epic set-title` / rename: recompute the id from the new slug (keeping
/// the numeric prefix), move every dependent file, and rewrite in-file
/// references. Rename is atomic per-file, not as a set: on any file error
/// the operation aborts reporting which files failed (spec §4.6).
pub fn rename_epic(paths: &Paths, epic_id: &EpicId, new_title: &str) -> Result<Epic> {
    let mut epic = definition::read_epic(paths, epic_id)?;
    let slug = crate::id::derive_slug(new_title);
    let new_id = EpicId::compose(epic_id.num(), Some(&slug));

    if new_id.as_str() != epic_id.as_str() && definition::epic_exists(paths, &new_id) {
        return Err(FlowError::EpicIdCollision(new_id.as_str().to_string()));
    }

    epic.title = new_title.to_string();
    epic.updated_at = now();

    if new_id.as_str() == epic_id.as_str() {
        definition::write_epic(paths, &epic)?;
        return Ok(epic);
    }

    let task_ids = definition::list_task_ids(paths, epic_id)?;
    let mut moved_files: Vec<std::path::PathBuf> = Vec::new();

    let result = (|| -> Result<()> {
        let spec = definition::read_epic_spec(paths, epic_id)?;
        epic.id = new_id.clone();
        epic.spec_path = format!(".flow/specs/{}.md", new_id.as_str());
        definition::write_epic_spec(paths, &new_id, &spec)?;
        moved_files.push(paths.specs_dir().join(format!("{}.md", new_id.as_str())));
        definition::write_epic(paths, &epic)?;
        moved_files.push(paths.epics_dir().join(format!("{}.json", new_id.as_str())));

        for old_task_id in &task_ids {
            let mut task = definition::read_task(paths, old_task_id)?;
            let new_task_id = TaskId::compose(&new_id, old_task_id.num());
            task.id = new_task_id.clone();
            task.epic = new_id.clone();
            task.spec_path = format!(".flow/tasks/{}.md", new_task_id.as_str());
            task.depends_on = task
                .depends_on
                .iter()
                .map(|d| TaskId::compose(&new_id, d.num()))
                .collect();

            let spec = definition::read_task_spec(paths, old_task_id)?;
            definition::write_task_spec(paths, &new_task_id, &spec)?;
            moved_files.push(paths.tasks_dir().join(format!("{}.md", new_task_id.as_str())));
            definition::write_task_preserving_legacy(paths, &task)?;
            moved_files.push(paths.tasks_dir().join(format!("{}.json", new_task_id.as_str())));

            if let Some(runtime) = crate::store::runtime::load_runtime(paths, old_task_id)? {
                crate::store::runtime::with_lock(paths, &new_task_id, || {
                    crate::io::write_json_atomic(&paths.runtime_path(new_task_id.as_str()), &runtime)
                })?;
                moved_files.push(paths.runtime_path(new_task_id.as_str()));
            }
        }

        for other_id in definition::list_epic_ids(paths)? {
            if other_id.as_str() == epic_id.as_str() || other_id.as_str() == new_id.as_str() {
                continue;
            }
            let mut other = definition::read_epic(paths, &other_id)?;
            if other.depends_on_epics.iter().any(|d| d.as_str() == epic_id.as_str()) {
                other.depends_on_epics = other
                    .depends_on_epics
                    .into_iter()
                    .map(|d| if d.as_str() == epic_id.as_str() { new_id.clone() } else { d })
                    .collect();
                definition::write_epic(paths, &other)?;
            }
        }

        Ok(())
    })();

    if let Err(e) = result {
        return Err(FlowError::ToolFailed(
            "epic rename".into(),
            format!("{e} (moved {} files before failure)", moved_files.len()),
        ));
    }

    for old_task_id in &task_ids {
        let _ = std::fs::remove_file(paths.tasks_dir().join(format!("{}.json", old_task_id.as_str())));
        let _ = std::fs::remove_file(paths.tasks_dir().join(format!("{}.md", old_task_id.as_str())));
        let _ = crate::store::runtime::delete_runtime(paths, old_task_id);
    }
    let _ = std::fs::remove_file(paths.epics_dir().join(format!("{}.json", epic_id.as_str())));
    let _ = std::fs::remove_file(paths.specs_dir().join(format!("{}.md", epic_id.as_str())));

    Ok(epic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::definition::{self, CreateEpicArgs, CreateTaskArgs};
    use tempfile::tempdir;

    fn test_paths(dir: &std::path::Path) -> Paths {
        Paths {
            repo_root: dir.to_path_buf(),
            flow_dir: dir.join(".flow"),
            state_dir: dir.join(".flow/state"),
        }
    }

    fn setup() -> (tempfile::TempDir, Paths) {
        let dir = tempdir().unwrap();
        let paths = test_paths(dir.path());
        definition::init(&paths).unwrap();
        (dir, paths)
    }

    #[test]
    fn start_claims_task_for_actor() {
        let (_dir, paths) = setup();
        let epic = definition::create_epic(&paths, CreateEpicArgs { title: "Add auth", branch: None }).unwrap();
        let task = definition::create_task(
            &paths,
            CreateTaskArgs { epic: &epic.id, title: "Schema", deps: vec![], priority: None, description: None, acceptance: None },
        )
        .unwrap();

        let merged = start(&paths, &task.id, "alice", false, None).unwrap();
        assert_eq!(merged.runtime.status, TaskStatus::InProgress);
        assert_eq!(merged.runtime.assignee.as_deref(), Some("alice"));
    }

    #[test]
    fn start_rejects_cross_actor_without_force() {
        let (_dir, paths) = setup();
        let epic = definition::create_epic(&paths, CreateEpicArgs { title: "X", branch: None }).unwrap();
        let task = definition::create_task(
            &paths,
            CreateTaskArgs { epic: &epic.id, title: "Y", deps: vec![], priority: None, description: None, acceptance: None },
        )
        .unwrap();
        start(&paths, &task.id, "alice", false, None).unwrap();
        let err = start(&paths, &task.id, "bob", false, None).unwrap_err();
        assert!(matches!(err, FlowError::ClaimedByOther(_, _)));

        let merged = start(&paths, &task.id, "bob", true, Some("taking over")).unwrap();
        assert_eq!(merged.runtime.assignee.as_deref(), Some("bob"));
        assert_eq!(merged.runtime.claim_note, "taking over");
    }

    #[test]
    fn start_blocks_on_incomplete_dependency() {
        let (_dir, paths) = setup();
        let epic = definition::create_epic(&paths, CreateEpicArgs { title: "X", branch: None }).unwrap();
        let t1 = definition::create_task(
            &paths,
            CreateTaskArgs { epic: &epic.id, title: "A", deps: vec![], priority: None, description: None, acceptance: None },
        )
        .unwrap();
        let t2 = definition::create_task(
            &paths,
            CreateTaskArgs { epic: &epic.id, title: "B", deps: vec![t1.id.clone()], priority: None, description: None, acceptance: None },
        )
        .unwrap();
        let err = start(&paths, &t2.id, "alice", false, None).unwrap_err();
        assert!(matches!(err, FlowError::DependencyNotDone(_, _)));
    }

    #[test]
    fn done_requires_in_progress_and_patches_spec() {
        let (_dir, paths) = setup();
        let epic = definition::create_epic(&paths, CreateEpicArgs { title: "X", branch: None }).unwrap();
        let task = definition::create_task(
            &paths,
            CreateTaskArgs { epic: &epic.id, title: "A", deps: vec![], priority: None, description: None, acceptance: None },
        )
        .unwrap();

        let err = done(&paths, &task.id, "alice", "done", Evidence::default(), false).unwrap_err();
        assert!(matches!(err, FlowError::InvalidTransition(_, _)));

        start(&paths, &task.id, "alice", false, None).unwrap();
        let evidence = Evidence { commits: vec!["abc".into()], tests: vec![], prs: vec![] };
        let merged = done(&paths, &task.id, "alice", "did the thing", evidence, false).unwrap();
        assert_eq!(merged.runtime.status, TaskStatus::Done);

        let spec = definition::read_task_spec(&paths, &task.id).unwrap();
        assert!(spec.contains("did the thing"));
        assert!(spec.contains("- Commits: abc"));
    }

    #[test]
    fn reset_cascades_through_dependents() {
        let (_dir, paths) = setup();
        let epic = definition::create_epic(&paths, CreateEpicArgs { title: "X", branch: None }).unwrap();
        let a = definition::create_task(
            &paths,
            CreateTaskArgs { epic: &epic.id, title: "A", deps: vec![], priority: None, description: None, acceptance: None },
        )
        .unwrap();
        let b = definition::create_task(
            &paths,
            CreateTaskArgs { epic: &epic.id, title: "B", deps: vec![a.id.clone()], priority: None, description: None, acceptance: None },
        )
        .unwrap();
        let c = definition::create_task(
            &paths,
            CreateTaskArgs { epic: &epic.id, title: "C", deps: vec![b.id.clone()], priority: None, description: None, acceptance: None },
        )
        .unwrap();

        for t in [&a, &b, &c] {
            start(&paths, &t.id, "alice", false, None).unwrap();
            done(&paths, &t.id, "alice", "done", Evidence::default(), false).unwrap();
        }

        let reset_ids = reset(&paths, &a.id, true).unwrap();
        assert_eq!(reset_ids.len(), 3);
        for t in [&a, &b, &c] {
            let merged = store::read_merged_task(&paths, &t.id).unwrap();
            assert_eq!(merged.runtime.status, TaskStatus::Todo);
        }
    }

    #[test]
    fn close_epic_rejects_incomplete_tasks() {
        let (_dir, paths) = setup();
        let epic = definition::create_epic(&paths, CreateEpicArgs { title: "X", branch: None }).unwrap();
        definition::create_task(
            &paths,
            CreateTaskArgs { epic: &epic.id, title: "A", deps: vec![], priority: None, description: None, acceptance: None },
        )
        .unwrap();
        let err = close_epic(&paths, &epic.id).unwrap_err();
        assert!(matches!(err, FlowError::EpicHasIncompleteTasks(_, _)));
    }

    #[test]
    fn rename_epic_moves_all_files() {
        let (_dir, paths) = setup();
        let epic = definition::create_epic(&paths, CreateEpicArgs { title: "Old Title", branch: None }).unwrap();
        let task = definition::create_task(
            &paths,
            CreateTaskArgs { epic: &epic.id, title: "A", deps: vec![], priority: None, description: None, acceptance: None },
        )
        .unwrap();
        let renamed = rename_epic(&paths, &epic.id, "New Title").unwrap();
        assert_eq!(renamed.id.as_str(), format!("fn-{}-new-title", epic.id.num()));
        assert!(!definition::epic_exists(&paths, &epic.id));
        let new_task_id = TaskId::compose(&renamed.id, task.id.num());
        assert!(definition::task_exists(&paths, &new_task_id));
    }

    #[test]
    fn parse_evidence_json_promotes_bare_strings() {
        let ev = parse_evidence_json(r#"{"commits": "abc", "tests": ["t1", "t2"]}"#).unwrap();
        assert_eq!(ev.commits, vec!["abc"]);
        assert_eq!(ev.tests, vec!["t1", "t2"]);
        assert!(ev.prs.is_empty());
    }
}
