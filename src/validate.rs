use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::Result;
use crate::id::{EpicId, TaskId};
use crate::model::{EpicStatus, TaskStatus};
use crate::paths::Paths;
use crate::spec_patch;
use crate::store;
use crate::store::definition;

#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }
}

pub fn build_dependency_adjacency(
    paths: &Paths,
    epic: &EpicId,
) -> Result<HashMap<TaskId, Vec<TaskId>>> {
    let mut adjacency = HashMap::new();
    for task_id in definition::list_task_ids(paths, epic)? {
        let task = definition::read_task(paths, &task_id)?;
        adjacency.insert(task_id, task.depends_on);
    }
    Ok(adjacency)
}

/// DFS reachability: is `target` reachable from `start` in `adjacency`?
pub fn has_path(adjacency: &HashMap<TaskId, Vec<TaskId>>, start: &TaskId, target: &TaskId) -> bool {
    let mut visited = HashSet::new();
    let mut stack = vec![start.clone()];
    while let Some(node) = stack.pop() {
        if &node == target {
            return true;
        }
        if !visited.insert(node.clone()) {
            continue;
        }
        if let Some(deps) = adjacency.get(&node) {
            stack.extend(deps.iter().cloned());
        }
    }
    false
}

/// Reject self-edges and edges that would close a transitive cycle against
/// the existing graph before committing them.
pub fn validate_dependency_plan(
    task_id: &TaskId,
    new_deps: &[TaskId],
    adjacency: &HashMap<TaskId, Vec<TaskId>>,
) -> Result<()> {
    for dep in new_deps {
        if dep == task_id {
            return Err(crate::error::FlowError::SelfDependency(task_id.as_str().to_string()));
        }
        if has_path(adjacency, dep, task_id) {
            return Err(crate::error::FlowError::CycleDetected(format!(
                "{} -> {} would close a cycle",
                task_id.as_str(),
                dep.as_str()
            )));
        }
    }
    Ok(())
}

/// DFS cycle detection over the full epic graph; returns the first cycle
/// found as a chain of task ids, if any.
pub fn find_cycle(adjacency: &HashMap<TaskId, Vec<TaskId>>) -> Option<Vec<TaskId>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }
    let mut marks: HashMap<TaskId, Mark> = HashMap::new();
    let mut stack: Vec<TaskId> = Vec::new();

    fn visit(
        node: &TaskId,
        adjacency: &HashMap<TaskId, Vec<TaskId>>,
        marks: &mut HashMap<TaskId, Mark>,
        stack: &mut Vec<TaskId>,
    ) -> Option<Vec<TaskId>> {
        if let Some(Mark::Visiting) = marks.get(node) {
            let start = stack.iter().position(|n| n == node).unwrap_or(0);
            let mut chain = stack[start..].to_vec();
            chain.push(node.clone());
            return Some(chain);
        }
        if marks.get(node) == Some(&Mark::Done) {
            return None;
        }
        marks.insert(node.clone(), Mark::Visiting);
        stack.push(node.clone());
        if let Some(deps) = adjacency.get(node) {
            for dep in deps {
                if let Some(cycle) = visit(dep, adjacency, marks, stack) {
                    return Some(cycle);
                }
            }
        }
        stack.pop();
        marks.insert(node.clone(), Mark::Done);
        None
    }

    for node in adjacency.keys() {
        if let Some(cycle) = visit(node, adjacency, &mut marks, &mut stack) {
            return Some(cycle);
        }
    }
    None
}

pub fn validate_epic(paths: &Paths, epic_id: &EpicId) -> Result<ValidationReport> {
    let mut report = ValidationReport::default();

    let epic = match definition::read_epic(paths, epic_id) {
        Ok(e) => e,
        Err(e) => {
            report.error(e.to_string());
            return Ok(report);
        }
    };
    if definition::read_epic_spec(paths, epic_id).is_err() {
        report.error(format!("epic '{}' has no matching spec file", epic_id.as_str()));
    }

    for dep in &epic.depends_on_epics {
        if dep.as_str() == epic_id.as_str() {
            report.error(format!("epic '{}' depends on itself", epic_id.as_str()));
            continue;
        }
        if !definition::epic_exists(paths, dep) {
            report.error(format!(
                "epic '{}' depends on non-existent epic '{}'",
                epic_id.as_str(),
                dep.as_str()
            ));
        }
    }

    let task_ids = definition::list_task_ids(paths, epic_id)?;
    let adjacency = build_dependency_adjacency(paths, epic_id)?;

    let mut all_done = true;
    for task_id in &task_ids {
        let task = definition::read_task(paths, task_id)?;
        match definition::read_task_spec(paths, task_id) {
            Ok(spec) => {
                if let Err(e) = spec_patch::validate_task_spec_headings(&spec) {
                    report.error(format!("task '{}': {e}", task_id.as_str()));
                }
            }
            Err(e) => report.error(format!("task '{}': {e}", task_id.as_str())),
        }

        for dep in &task.depends_on {
            if dep.epic_of().as_str() != epic_id.as_str() {
                report.error(format!(
                    "task '{}' depends on '{}' outside its epic",
                    task_id.as_str(),
                    dep.as_str()
                ));
            } else if !definition::task_exists(paths, dep) {
                report.error(format!(
                    "task '{}' depends on non-existent task '{}'",
                    task_id.as_str(),
                    dep.as_str()
                ));
            }
        }

        let merged = store::read_merged_task_from(paths, &task)?;
        if merged.runtime.status != TaskStatus::Done {
            all_done = false;
        }
    }

    if let Some(cycle) = find_cycle(&adjacency) {
        let chain = cycle.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(" -> ");
        report.error(format!("dependency cycle detected: {chain}"));
    }

    if epic.status == EpicStatus::Done && !all_done {
        report.error(format!(
            "epic '{}' is marked done but has incomplete tasks",
            epic_id.as_str()
        ));
    }

    Ok(report)
}

pub fn validate_root(paths: &Paths) -> ValidationReport {
    let mut report = ValidationReport::default();
    if let Err(e) = definition::read_meta(paths) {
        report.error(e.to_string());
    }
    for dir in [paths.epics_dir(), paths.specs_dir(), paths.tasks_dir()] {
        if !dir.exists() {
            report.error(format!("missing required directory: {}", dir.display()));
        }
    }
    report
}

pub fn validate_all(paths: &Paths) -> Result<ValidationReport> {
    let mut report = validate_root(paths);
    let epic_ids = definition::list_epic_ids(paths)?;

    let mut seen_nums: HashMap<u64, EpicId> = HashMap::new();
    for id in &epic_ids {
        if let Some(existing) = seen_nums.get(&id.num()) {
            if existing.as_str() != id.as_str() {
                report.error(format!(
                    "epic id collision: '{}' and '{}' share numeric prefix {}",
                    existing.as_str(),
                    id.as_str(),
                    id.num()
                ));
            }
        } else {
            seen_nums.insert(id.num(), id.clone());
        }
    }

    for id in &epic_ids {
        let epic_report = validate_epic(paths, id)?;
        report.errors.extend(epic_report.errors);
        report.warnings.extend(epic_report.warnings);
    }

    if let Ok(entries) = std::fs::read_dir(paths.specs_dir()) {
        for entry in entries.flatten() {
            let path = entry.path();
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if let Ok(id) = EpicId::parse(stem) {
                    if !definition::epic_json_exists(paths, &id) {
                        report.warning(format!("orphan spec file with no epic record: {}", path.display()));
                    }
                }
            }
        }
    }

    Ok(report)
}
