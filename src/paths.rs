use std::env;
use std::path::{Path, PathBuf};

use crate::vcs;

/// Resolved filesystem layout for one invocation: repo root, `.flow` dir, and
/// the (possibly worktree-shared) runtime state dir.
#[derive(Debug, Clone)]
pub struct Paths {
    pub repo_root: PathBuf,
    pub flow_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl Paths {
    /// Resolve paths relative to `cwd` per spec §4.1: repo root via VCS (fall
    /// back to `cwd`), flow dir = `<repo>/.flow`, state dir = explicit env
    /// override, else VCS common dir, else `<flow>/state`.
    pub fn resolve(cwd: &Path) -> Self {
        let repo_root = vcs::find_repo_root(cwd).unwrap_or_else(|| cwd.to_path_buf());
        let flow_dir = repo_root.join(".flow");
        let state_dir = resolve_state_dir(&repo_root, &flow_dir);
        Self {
            repo_root,
            flow_dir,
            state_dir,
        }
    }

    pub fn meta_path(&self) -> PathBuf {
        self.flow_dir.join("meta.json")
    }

    pub fn config_path(&self) -> PathBuf {
        self.flow_dir.join("config.json")
    }

    pub fn epics_dir(&self) -> PathBuf {
        self.flow_dir.join("epics")
    }

    pub fn specs_dir(&self) -> PathBuf {
        self.flow_dir.join("specs")
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.flow_dir.join("tasks")
    }

    pub fn memory_dir(&self) -> PathBuf {
        self.flow_dir.join("memory")
    }

    pub fn checkpoint_path(&self, epic_id: &str) -> PathBuf {
        self.flow_dir.join(format!(".checkpoint-{epic_id}.json"))
    }

    pub fn runtime_dir(&self) -> PathBuf {
        self.state_dir.join("tasks")
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.state_dir.join("locks")
    }

    pub fn runtime_path(&self, task_id: &str) -> PathBuf {
        self.runtime_dir().join(format!("{task_id}.state.json"))
    }

    pub fn lock_path(&self, task_id: &str) -> PathBuf {
        self.locks_dir().join(format!("{task_id}.lock"))
    }
}

fn resolve_state_dir(repo_root: &Path, flow_dir: &Path) -> PathBuf {
    if let Ok(explicit) = env::var("FLOW_STATE_DIR") {
        if !explicit.is_empty() {
            return PathBuf::from(explicit);
        }
    }
    if let Some(common) = vcs::find_common_dir(repo_root) {
        return common.join("flow-state");
    }
    flow_dir.join("state")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_state_dir_env_wins() {
        unsafe {
            env::set_var("FLOW_STATE_DIR", "/tmp/explicit-state");
        }
        let paths = Paths::resolve(Path::new("/tmp"));
        assert_eq!(paths.state_dir, PathBuf::from("/tmp/explicit-state"));
        unsafe {
            env::remove_var("FLOW_STATE_DIR");
        }
    }

    #[test]
    fn flow_dir_is_repo_root_dot_flow() {
        unsafe {
            env::remove_var("FLOW_STATE_DIR");
        }
        let tmp = std::env::temp_dir();
        let paths = Paths::resolve(&tmp);
        assert_eq!(paths.flow_dir.file_name().unwrap(), ".flow");
    }
}
