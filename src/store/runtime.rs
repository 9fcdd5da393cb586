use crate::error::Result;
use crate::id::TaskId;
use crate::io;
use crate::model::{Evidence, RuntimeState, TaskStatus, now};
use crate::paths::Paths;
use crate::store::definition;
use crate::store::lock;

/// Returns the stored runtime object, or `None` if no runtime file exists
/// yet. Callers needing the backward-compat overlay should use
/// [`crate::model::merge`] with the task definition instead of calling this
/// directly when they need a view that is never `None`.
pub fn load_runtime(paths: &Paths, task_id: &TaskId) -> Result<Option<RuntimeState>> {
    io::read_json_opt(&paths.runtime_path(task_id.as_str()))
}

fn write_runtime(paths: &Paths, task_id: &TaskId, state: &RuntimeState) -> Result<()> {
    io::write_json_atomic(&paths.runtime_path(task_id.as_str()), state)
}

/// Merge: read current -> apply `patch` -> stamp `updated_at` -> atomic-write.
pub fn save_runtime(
    paths: &Paths,
    task_id: &TaskId,
    patch: impl FnOnce(&mut RuntimeState),
) -> Result<RuntimeState> {
    let mut state = load_runtime(paths, task_id)?.unwrap_or_default();
    patch(&mut state);
    state.updated_at = now();
    write_runtime(paths, task_id, &state)?;
    Ok(state)
}

/// Overwrites with `{status: todo, updated_at: now}`, clearing claim,
/// evidence, and blocked reason.
pub fn reset_runtime(paths: &Paths, task_id: &TaskId) -> Result<RuntimeState> {
    let state = RuntimeState {
        status: TaskStatus::Todo,
        assignee: None,
        claimed_at: None,
        claim_note: String::new(),
        evidence: Evidence::default(),
        blocked_reason: None,
        updated_at: now(),
    };
    write_runtime(paths, task_id, &state)?;
    Ok(state)
}

pub fn delete_runtime(paths: &Paths, task_id: &TaskId) -> Result<()> {
    let path = paths.runtime_path(task_id.as_str());
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

/// Acquire the per-task exclusive lock for the duration of `f`; degrades to
/// best-effort on platforms without advisory locking (spec §9).
pub fn with_lock<T>(paths: &Paths, task_id: &TaskId, f: impl FnOnce() -> Result<T>) -> Result<T> {
    lock::with_lock(&paths.lock_path(task_id.as_str()), f)
}

/// `migrate-state`: for every task carrying inline legacy runtime fields but
/// no runtime-store file yet, extract those fields into the runtime store.
/// With `clean`, also strips the legacy fields from the definition file;
/// without it, the definition is left untouched (migration is additive
/// only), per spec §4.4.
pub fn migrate_all(paths: &Paths, clean: bool) -> Result<Vec<TaskId>> {
    let mut migrated = Vec::new();
    for epic_id in definition::list_epic_ids(paths)? {
        for task_id in definition::list_task_ids(paths, &epic_id)? {
            let task = definition::read_task(paths, &task_id)?;
            if task.legacy_runtime.is_empty() {
                continue;
            }
            if load_runtime(paths, &task_id)?.is_some() {
                continue;
            }
            with_lock(paths, &task_id, || {
                let state = RuntimeState::from_legacy(&task.legacy_runtime);
                write_runtime(paths, &task_id, &state)
            })?;
            if clean {
                definition::write_task(paths, &task)?;
            }
            migrated.push(task_id);
        }
    }
    Ok(migrated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::EpicId;
    use tempfile::tempdir;

    fn test_paths(dir: &std::path::Path) -> Paths {
        Paths {
            repo_root: dir.to_path_buf(),
            flow_dir: dir.join(".flow"),
            state_dir: dir.join(".flow/state"),
        }
    }

    #[test]
    fn save_runtime_merges_and_stamps_updated_at() {
        let dir = tempdir().unwrap();
        let paths = test_paths(dir.path());
        let epic = EpicId::parse("fn-1").unwrap();
        let task = TaskId::compose(&epic, 1);

        save_runtime(&paths, &task, |s| s.status = TaskStatus::InProgress).unwrap();
        let loaded = load_runtime(&paths, &task).unwrap().unwrap();
        assert_eq!(loaded.status, TaskStatus::InProgress);

        save_runtime(&paths, &task, |s| s.assignee = Some("alice".into())).unwrap();
        let loaded = load_runtime(&paths, &task).unwrap().unwrap();
        assert_eq!(loaded.status, TaskStatus::InProgress);
        assert_eq!(loaded.assignee.as_deref(), Some("alice"));
    }

    #[test]
    fn migrate_all_extracts_legacy_fields_once() {
        let dir = tempdir().unwrap();
        let paths = test_paths(dir.path());
        definition::init(&paths).unwrap();
        let epic = definition::create_epic(&paths, definition::CreateEpicArgs { title: "X", branch: None }).unwrap();
        let mut task = definition::create_task(
            &paths,
            definition::CreateTaskArgs { epic: &epic.id, title: "A", deps: vec![], priority: None, description: None, acceptance: None },
        )
        .unwrap();
        task.legacy_runtime.status = Some(TaskStatus::InProgress);
        task.legacy_runtime.assignee = Some("carol".into());
        definition::write_task_preserving_legacy(&paths, &task).unwrap();

        let migrated = migrate_all(&paths, false).unwrap();
        assert_eq!(migrated, vec![task.id.clone()]);
        let runtime = load_runtime(&paths, &task.id).unwrap().unwrap();
        assert_eq!(runtime.status, TaskStatus::InProgress);
        assert_eq!(runtime.assignee.as_deref(), Some("carol"));

        let reread = definition::read_task(&paths, &task.id).unwrap();
        assert_eq!(reread.legacy_runtime.assignee.as_deref(), Some("carol"));

        assert!(migrate_all(&paths, false).unwrap().is_empty());
    }

    #[test]
    fn migrate_all_with_clean_strips_legacy_fields() {
        let dir = tempdir().unwrap();
        let paths = test_paths(dir.path());
        definition::init(&paths).unwrap();
        let epic = definition::create_epic(&paths, definition::CreateEpicArgs { title: "X", branch: None }).unwrap();
        let mut task = definition::create_task(
            &paths,
            definition::CreateTaskArgs { epic: &epic.id, title: "A", deps: vec![], priority: None, description: None, acceptance: None },
        )
        .unwrap();
        task.legacy_runtime.status = Some(TaskStatus::Done);
        definition::write_task_preserving_legacy(&paths, &task).unwrap();

        migrate_all(&paths, true).unwrap();
        let reread = definition::read_task(&paths, &task.id).unwrap();
        assert!(reread.legacy_runtime.is_empty());
    }

    #[test]
    fn reset_runtime_clears_everything() {
        let dir = tempdir().unwrap();
        let paths = test_paths(dir.path());
        let epic = EpicId::parse("fn-1").unwrap();
        let task = TaskId::compose(&epic, 1);
        save_runtime(&paths, &task, |s| {
            s.status = TaskStatus::Done;
            s.assignee = Some("bob".into());
        })
        .unwrap();
        let reset = reset_runtime(&paths, &task).unwrap();
        assert_eq!(reset.status, TaskStatus::Todo);
        assert!(reset.assignee.is_none());
    }
}
