//! Ready-set computation and next-unit selection (spec §4.7).

use std::collections::HashMap;

use serde::Serialize;

use crate::error::Result;
use crate::id::{EpicId, TaskId};
use crate::model::{MergedTask, ReviewVerdict, TaskStatus};
use crate::paths::Paths;
use crate::store;
use crate::store::definition;

#[derive(Debug, Clone, Serialize)]
pub struct BlockedTask {
    pub task: MergedTask,
    pub blocked_on: Vec<TaskId>,
}

#[derive(Debug, Default, Serialize)]
pub struct ReadySet {
    pub ready: Vec<MergedTask>,
    pub in_progress: Vec<MergedTask>,
    pub blocked: Vec<BlockedTask>,
}

/// `ready(epic)` per spec §4.7: partitions tasks into ready / in_progress /
/// blocked, sorted `(priority, task_num, title)` ascending with `priority =
/// null` sorting after every real priority.
pub fn ready(paths: &Paths, epic: &EpicId) -> Result<ReadySet> {
    let task_ids = definition::list_task_ids(paths, epic)?;
    let mut merged_by_id: HashMap<TaskId, MergedTask> = HashMap::new();
    for id in &task_ids {
        merged_by_id.insert(id.clone(), store::read_merged_task(paths, id)?);
    }

    let mut set = ReadySet::default();
    for id in &task_ids {
        let merged = merged_by_id.get(id).unwrap().clone();
        match merged.runtime.status {
            TaskStatus::InProgress => set.in_progress.push(merged),
            TaskStatus::Blocked => {
                set.blocked.push(BlockedTask { task: merged, blocked_on: Vec::new() });
            }
            TaskStatus::Done => {}
            TaskStatus::Todo => {
                let mut unmet = Vec::new();
                for dep in &merged.definition.depends_on {
                    let dep_status = merged_by_id
                        .get(dep)
                        .map(|m| m.runtime.status)
                        .unwrap_or(TaskStatus::Todo);
                    if dep_status != TaskStatus::Done {
                        unmet.push(dep.clone());
                    }
                }
                if unmet.is_empty() {
                    set.ready.push(merged);
                } else {
                    set.blocked.push(BlockedTask { task: merged, blocked_on: unmet });
                }
            }
        }
    }

    sort_merged(&mut set.ready);
    sort_merged(&mut set.in_progress);
    set.blocked.sort_by(|a, b| sort_key(&a.task).cmp(&sort_key(&b.task)));

    Ok(set)
}

fn sort_key(task: &MergedTask) -> (i64, u64, String) {
    let priority = task.definition.priority.unwrap_or(i64::MAX);
    (priority, task.definition.id.num(), task.definition.title.clone())
}

fn sort_merged(tasks: &mut [MergedTask]) {
    tasks.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextStatus {
    Task,
    Plan,
    CompletionReview,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextReason {
    ResumeInProgress,
    ReadyTask,
    NeedsPlanReview,
    NeedsCompletionReview,
    BlockedByEpicDeps,
    None,
}

#[derive(Debug, Serialize)]
pub struct NextResult {
    pub status: NextStatus,
    pub reason: NextReason,
    pub epic: Option<EpicId>,
    pub task: Option<MergedTask>,
    pub blocked_epics: HashMap<String, Vec<String>>,
}

impl NextResult {
    fn none(reason: NextReason, blocked_epics: HashMap<String, Vec<String>>) -> Self {
        Self { status: NextStatus::None, reason, epic: None, task: None, blocked_epics }
    }
}

pub struct NextArgs<'a> {
    pub epics: Option<&'a [EpicId]>,
    pub require_plan_review: bool,
    pub require_completion_review: bool,
    pub actor: &'a str,
}

/// `next(epics?, require_plan_review?, require_completion_review?)` per spec
/// §4.7: walks epics in order, applying epic-dependency, plan-review, and
/// completion-review gates before returning the first eligible task.
pub fn next(paths: &Paths, args: NextArgs) -> Result<NextResult> {
    let ordered: Vec<EpicId> = match args.epics {
        Some(list) => list.to_vec(),
        None => definition::list_epic_ids(paths)?,
    };

    let mut blocked_epics: HashMap<String, Vec<String>> = HashMap::new();
    let mut scanned_count = 0usize;

    for epic_id in &ordered {
        let epic = definition::read_epic(paths, epic_id)?;
        if epic.status == crate::model::EpicStatus::Done {
            continue;
        }
        scanned_count += 1;

        let mut unmet_epic_deps = Vec::new();
        for dep in &epic.depends_on_epics {
            let dep_done = definition::epic_exists(paths, dep)
                && definition::read_epic(paths, dep).map(|e| e.status == crate::model::EpicStatus::Done).unwrap_or(false);
            if !dep_done {
                unmet_epic_deps.push(dep.as_str().to_string());
            }
        }
        if !unmet_epic_deps.is_empty() {
            blocked_epics.insert(epic_id.as_str().to_string(), unmet_epic_deps);
            continue;
        }

        if args.require_plan_review && epic.plan_review_status != ReviewVerdict::Ship {
            return Ok(NextResult {
                status: NextStatus::Plan,
                reason: NextReason::NeedsPlanReview,
                epic: Some(epic_id.clone()),
                task: None,
                blocked_epics,
            });
        }

        let set = ready(paths, epic_id)?;

        if let Some(owned) = set
            .in_progress
            .iter()
            .find(|t| t.runtime.assignee.as_deref() == Some(args.actor))
        {
            return Ok(NextResult {
                status: NextStatus::Task,
                reason: NextReason::ResumeInProgress,
                epic: Some(epic_id.clone()),
                task: Some(owned.clone()),
                blocked_epics,
            });
        }

        if let Some(first) = set.ready.first() {
            return Ok(NextResult {
                status: NextStatus::Task,
                reason: NextReason::ReadyTask,
                epic: Some(epic_id.clone()),
                task: Some(first.clone()),
                blocked_epics,
            });
        }

        let all_tasks_done = set.in_progress.is_empty()
            && set.blocked.is_empty()
            && !definition::list_task_ids(paths, epic_id)?.is_empty();

        if args.require_completion_review && all_tasks_done && epic.completion_review_status != ReviewVerdict::Ship {
            return Ok(NextResult {
                status: NextStatus::CompletionReview,
                reason: NextReason::NeedsCompletionReview,
                epic: Some(epic_id.clone()),
                task: None,
                blocked_epics,
            });
        }
    }

    if scanned_count > 0 && blocked_epics.len() == scanned_count {
        return Ok(NextResult::none(NextReason::BlockedByEpicDeps, blocked_epics));
    }

    Ok(NextResult::none(NextReason::None, blocked_epics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle;
    use crate::model::Evidence;
    use crate::store::definition::{self as def, CreateEpicArgs, CreateTaskArgs};
    use tempfile::tempdir;

    fn test_paths(dir: &std::path::Path) -> Paths {
        Paths { repo_root: dir.to_path_buf(), flow_dir: dir.join(".flow"), state_dir: dir.join(".flow/state") }
    }

    fn setup() -> (tempfile::TempDir, Paths) {
        let dir = tempdir().unwrap();
        let paths = test_paths(dir.path());
        def::init(&paths).unwrap();
        (dir, paths)
    }

    #[test]
    fn ready_partitions_by_dependency_status() {
        let (_dir, paths) = setup();
        let epic = def::create_epic(&paths, CreateEpicArgs { title: "X", branch: None }).unwrap();
        let a = def::create_task(
            &paths,
            CreateTaskArgs { epic: &epic.id, title: "A", deps: vec![], priority: None, description: None, acceptance: None },
        )
        .unwrap();
        let b = def::create_task(
            &paths,
            CreateTaskArgs { epic: &epic.id, title: "B", deps: vec![a.id.clone()], priority: None, description: None, acceptance: None },
        )
        .unwrap();

        let set = ready(&paths, &epic.id).unwrap();
        assert_eq!(set.ready.len(), 1);
        assert_eq!(set.ready[0].definition.id, a.id);
        assert_eq!(set.blocked.len(), 1);
        assert_eq!(set.blocked[0].task.definition.id, b.id);
        assert_eq!(set.blocked[0].blocked_on, vec![a.id.clone()]);
    }

    #[test]
    fn next_returns_ready_task_after_dependency_completes() {
        let (_dir, paths) = setup();
        let epic = def::create_epic(&paths, CreateEpicArgs { title: "X", branch: None }).unwrap();
        let a = def::create_task(
            &paths,
            CreateTaskArgs { epic: &epic.id, title: "A", deps: vec![], priority: None, description: None, acceptance: None },
        )
        .unwrap();
        let b = def::create_task(
            &paths,
            CreateTaskArgs { epic: &epic.id, title: "B", deps: vec![a.id.clone()], priority: None, description: None, acceptance: None },
        )
        .unwrap();

        let result = next(
            &paths,
            NextArgs { epics: None, require_plan_review: false, require_completion_review: false, actor: "alice" },
        )
        .unwrap();
        assert_eq!(result.task.unwrap().definition.id, a.id);

        lifecycle::start(&paths, &a.id, "alice", false, None).unwrap();
        lifecycle::done(&paths, &a.id, "alice", "done", Evidence::default(), false).unwrap();

        let result = next(
            &paths,
            NextArgs { epics: None, require_plan_review: false, require_completion_review: false, actor: "alice" },
        )
        .unwrap();
        assert_eq!(result.task.unwrap().definition.id, b.id);
    }

    #[test]
    fn next_gates_on_plan_review() {
        let (_dir, paths) = setup();
        let epic = def::create_epic(&paths, CreateEpicArgs { title: "X", branch: None }).unwrap();
        def::create_task(
            &paths,
            CreateTaskArgs { epic: &epic.id, title: "A", deps: vec![], priority: None, description: None, acceptance: None },
        )
        .unwrap();

        let result = next(
            &paths,
            NextArgs { epics: None, require_plan_review: true, require_completion_review: false, actor: "alice" },
        )
        .unwrap();
        assert_eq!(result.status, NextStatus::Plan);

        let mut epic = def::read_epic(&paths, &epic.id).unwrap();
        epic.plan_review_status = ReviewVerdict::Ship;
        def::write_epic(&paths, &epic).unwrap();

        let result = next(
            &paths,
            NextArgs { epics: None, require_plan_review: true, require_completion_review: false, actor: "alice" },
        )
        .unwrap();
        assert_eq!(result.status, NextStatus::Task);
        assert_eq!(result.reason, NextReason::ReadyTask);
    }

    #[test]
    fn next_resumes_in_progress_task_owned_by_actor() {
        let (_dir, paths) = setup();
        let epic = def::create_epic(&paths, CreateEpicArgs { title: "X", branch: None }).unwrap();
        let a = def::create_task(
            &paths,
            CreateTaskArgs { epic: &epic.id, title: "A", deps: vec![], priority: None, description: None, acceptance: None },
        )
        .unwrap();
        lifecycle::start(&paths, &a.id, "alice", false, None).unwrap();

        let result = next(
            &paths,
            NextArgs { epics: None, require_plan_review: false, require_completion_review: false, actor: "alice" },
        )
        .unwrap();
        assert_eq!(result.reason, NextReason::ResumeInProgress);
        assert_eq!(result.task.unwrap().definition.id, a.id);
    }
}
