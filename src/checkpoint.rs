//! Snapshot and restore of a full epic (definition + spec + runtime), spec §4.9.

use crate::error::{FlowError, Result};
use crate::id::EpicId;
use crate::io;
use crate::model::{Checkpoint, CheckpointEpicEntry, CheckpointTaskEntry, now};
use crate::paths::Paths;
use crate::store::definition;
use crate::store::runtime as runtime_store;

const SCHEMA_VERSION: u32 = 2;

/// `checkpoint save`: writes `.checkpoint-<epic>.json` capturing epic data,
/// epic spec, and every task's data, spec, and current runtime (or `null`).
pub fn save(paths: &Paths, epic_id: &EpicId) -> Result<Checkpoint> {
    let epic = definition::read_epic(paths, epic_id)?;
    let epic_spec = definition::read_epic_spec(paths, epic_id)?;

    let mut tasks = Vec::new();
    for task_id in definition::list_task_ids(paths, epic_id)? {
        let data = definition::read_task(paths, &task_id)?;
        let spec = definition::read_task_spec(paths, &task_id)?;
        let runtime = runtime_store::load_runtime(paths, &task_id)?;
        tasks.push(CheckpointTaskEntry { id: task_id, data, spec, runtime });
    }

    let checkpoint = Checkpoint {
        schema_version: SCHEMA_VERSION,
        created_at: now(),
        epic_id: epic_id.clone(),
        epic: CheckpointEpicEntry { data: epic, spec: epic_spec },
        tasks,
    };
    io::write_json_atomic(&paths.checkpoint_path(epic_id.as_str()), &checkpoint)?;
    Ok(checkpoint)
}

pub fn load(paths: &Paths, epic_id: &EpicId) -> Result<Checkpoint> {
    io::read_json_opt(&paths.checkpoint_path(epic_id.as_str()))?
        .ok_or_else(|| FlowError::CheckpointNotFound(epic_id.as_str().to_string()))
}

/// `checkpoint restore`: overwrites every recorded entity, stamping
/// `updated_at` on each written record. A task with `runtime = null` has its
/// live runtime file deleted rather than left stale.
pub fn restore(paths: &Paths, epic_id: &EpicId) -> Result<Checkpoint> {
    let checkpoint = load(paths, epic_id)?;

    let mut epic = checkpoint.epic.data.clone();
    epic.updated_at = now();
    definition::write_epic(paths, &epic)?;
    definition::write_epic_spec(paths, epic_id, &checkpoint.epic.spec)?;

    for entry in &checkpoint.tasks {
        let mut task = entry.data.clone();
        task.updated_at = now();
        definition::write_task_preserving_legacy(paths, &task)?;
        definition::write_task_spec(paths, &entry.id, &entry.spec)?;

        runtime_store::with_lock(paths, &entry.id, || match &entry.runtime {
            Some(runtime) => {
                let mut stamped = runtime.clone();
                stamped.updated_at = now();
                io::write_json_atomic(&paths.runtime_path(entry.id.as_str()), &stamped)
            }
            None => runtime_store::delete_runtime(paths, &entry.id),
        })?;
    }

    Ok(checkpoint)
}

/// Deleting a missing checkpoint is a documented no-op success.
pub fn delete(paths: &Paths, epic_id: &EpicId) -> Result<()> {
    let path = paths.checkpoint_path(epic_id.as_str());
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle;
    use crate::model::{Evidence, TaskStatus};
    use crate::store;
    use crate::store::definition::{self as def, CreateEpicArgs, CreateTaskArgs};
    use tempfile::tempdir;

    fn test_paths(dir: &std::path::Path) -> Paths {
        Paths { repo_root: dir.to_path_buf(), flow_dir: dir.join(".flow"), state_dir: dir.join(".flow/state") }
    }

    #[test]
    fn save_then_restore_reproduces_prior_state_exactly() {
        let dir = tempdir().unwrap();
        let paths = test_paths(dir.path());
        def::init(&paths).unwrap();

        let epic = def::create_epic(&paths, CreateEpicArgs { title: "X", branch: None }).unwrap();
        let a = def::create_task(
            &paths,
            CreateTaskArgs { epic: &epic.id, title: "A", deps: vec![], priority: None, description: None, acceptance: None },
        )
        .unwrap();
        let b = def::create_task(
            &paths,
            CreateTaskArgs { epic: &epic.id, title: "B", deps: vec![], priority: None, description: None, acceptance: None },
        )
        .unwrap();

        lifecycle::start(&paths, &a.id, "alice", false, None).unwrap();
        lifecycle::done(
            &paths,
            &a.id,
            "alice",
            "shipped it",
            Evidence { commits: vec!["abc".into()], tests: vec![], prs: vec![] },
            false,
        )
        .unwrap();

        save(&paths, &epic.id).unwrap();

        lifecycle::reset(&paths, &a.id, false).unwrap();
        lifecycle::start(&paths, &b.id, "bob", false, None).unwrap();

        restore(&paths, &epic.id).unwrap();

        let merged_a = store::read_merged_task(&paths, &a.id).unwrap();
        assert_eq!(merged_a.runtime.status, TaskStatus::Done);
        assert_eq!(merged_a.runtime.evidence.commits, vec!["abc".to_string()]);
        let spec_a = def::read_task_spec(&paths, &a.id).unwrap();
        assert!(spec_a.contains("shipped it"));

        let merged_b = store::read_merged_task(&paths, &b.id).unwrap();
        assert_eq!(merged_b.runtime.status, TaskStatus::Todo);
    }

    #[test]
    fn delete_missing_checkpoint_is_a_noop() {
        let dir = tempdir().unwrap();
        let paths = test_paths(dir.path());
        def::init(&paths).unwrap();
        let epic = def::create_epic(&paths, CreateEpicArgs { title: "X", branch: None }).unwrap();
        delete(&paths, &epic.id).unwrap();
    }
}
