pub mod config;
pub mod definition;
pub mod lock;
pub mod runtime;

use crate::error::Result;
use crate::id::TaskId;
use crate::model::{MergedTask, Task, merge};
use crate::paths::Paths;

/// Present a merged task view (runtime overlaid onto definition) for a
/// single task, per spec §3's "Merged task" entity.
pub fn read_merged_task(paths: &Paths, task_id: &TaskId) -> Result<MergedTask> {
    let task = definition::read_task(paths, task_id)?;
    let runtime = runtime::load_runtime(paths, task_id)?;
    Ok(merge(&task, runtime))
}

pub fn read_merged_task_from(paths: &Paths, task: &Task) -> Result<MergedTask> {
    let runtime = runtime::load_runtime(paths, &task.id)?;
    Ok(merge(task, runtime))
}
