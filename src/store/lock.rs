use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;

use crate::error::{FlowError, Result};

/// Acquire an exclusive advisory lock on `path`, creating it if necessary.
/// On platforms without advisory locking this still creates/opens the file
/// but the underlying `try_lock_exclusive` call degrades to whatever `fs2`
/// provides there (see spec §9's documented weaker guarantee off-Unix).
pub fn acquire(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    file.try_lock_exclusive()
        .map_err(|_| FlowError::LockFailed(path.display().to_string()))?;
    Ok(file)
}

pub fn release(file: File) -> Result<()> {
    FileExt::unlock(&file)?;
    Ok(())
}

/// Run `f` while holding an exclusive lock on `path`; releases the lock
/// whether `f` succeeds or fails.
pub fn with_lock<T>(path: &Path, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let file = acquire(path)?;
    let result = f();
    let _ = release(file);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_exclusive_acquire_fails_while_first_held() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fn-1.1.lock");
        let first = acquire(&path).unwrap();
        let second = OpenOptions::new().read(true).write(true).open(&path).unwrap();
        assert!(second.try_lock_exclusive().is_err());
        release(first).unwrap();
        assert!(second.try_lock_exclusive().is_ok());
    }

    #[test]
    fn with_lock_releases_after_closure_returns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fn-2.1.lock");
        with_lock(&path, || Ok::<_, FlowError>(())).unwrap();
        let reacquired = acquire(&path);
        assert!(reacquired.is_ok());
    }
}
