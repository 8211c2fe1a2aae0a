//! Build directory locking
//!
//! Two runs must not share a build directory at the same time. Independent
//! runs use independent directories and never contend.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

/// Lock file name inside the locked directory.
pub const LOCK_FILE: &str = ".recipe.lock";

/// Take an exclusive lock on `dir` for the duration of a run.
/// Returns a guard that releases the lock when dropped.
///
/// Ownership is the flock alone. A lock file left behind by a crashed run is
/// reused; a held lock blocks however old its file is.
pub fn acquire_run_lock(dir: &Path) -> Result<RunLock> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    let lock_path = dir.join(LOCK_FILE);

    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;

    if lock_file.try_lock_exclusive().is_err() {
        anyhow::bail!(
            "'{}' is already in use by another recipe run ({})",
            dir.display(),
            lock_path.display()
        );
    }

    Ok(RunLock { file: lock_file })
}

/// RAII guard for a run lock. Releases the flock when dropped; the lock file
/// itself is never unlinked.
#[derive(Debug)]
pub struct RunLock {
    file: File,
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    #[test]
    fn test_lock_acquired_successfully() {
        let dir = TempDir::new().unwrap();
        let lock = acquire_run_lock(dir.path());
        assert!(lock.is_ok());
        assert!(dir.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = TempDir::new().unwrap();
        {
            let _lock = acquire_run_lock(dir.path()).unwrap();
            assert!(acquire_run_lock(dir.path()).is_err());
        }
        assert!(acquire_run_lock(dir.path()).is_ok());
    }

    #[test]
    fn test_concurrent_lock_blocked() {
        let dir = TempDir::new().unwrap();
        let _lock1 = acquire_run_lock(dir.path()).unwrap();
        let lock2 = acquire_run_lock(dir.path());
        assert!(lock2.is_err());
        assert!(lock2.unwrap_err().to_string().contains("already in use"));
    }

    #[test]
    fn test_old_lock_file_still_held() {
        let dir = TempDir::new().unwrap();
        let _held = acquire_run_lock(dir.path()).unwrap();

        let lock_path = dir.path().join(LOCK_FILE);
        let three_hours_ago = SystemTime::now() - Duration::from_secs(3 * 3600);
        filetime::set_file_mtime(&lock_path, FileTime::from_system_time(three_hours_ago)).unwrap();

        assert!(acquire_run_lock(dir.path()).is_err());
        assert!(lock_path.exists());
    }

    #[test]
    fn test_leftover_unlocked_file_is_reused() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(LOCK_FILE), "").unwrap();
        assert!(acquire_run_lock(dir.path()).is_ok());
    }

    #[test]
    fn test_separate_directories_do_not_contend() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let _la = acquire_run_lock(a.path()).unwrap();
        assert!(acquire_run_lock(b.path()).is_ok());
    }
}
