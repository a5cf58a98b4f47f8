use crate::StoreError;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Who holds a profile lock, recorded inside the lock file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockOwner {
    pub pid: u32,
    pub acquired_at: String,
}

/// Exclusive, advisory lock on one profile, released on drop.
pub struct ProfileLock {
    lock_file: File,
    path: PathBuf,
}

impl ProfileLock {
    /// Block until the lock at `lock_path` is held.
    pub fn acquire(lock_path: &Path) -> Result<Self, StoreError> {
        let file = open_lock_file(lock_path)?;
        file.lock_exclusive()
            .map_err(|e| StoreError::LockFailed(format!("{}: {e}", lock_path.display())))?;
        Self::held(file, lock_path)
    }

    /// Take the lock if it is free; `None` when another holder has it.
    pub fn try_acquire(lock_path: &Path) -> Result<Option<Self>, StoreError> {
        let file = open_lock_file(lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Self::held(file, lock_path).map(Some),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(StoreError::LockFailed(format!(
                "{}: {e}",
                lock_path.display()
            ))),
        }
    }

    fn held(mut file: File, lock_path: &Path) -> Result<Self, StoreError> {
        let owner = LockOwner {
            pid: std::process::id(),
            acquired_at: chrono::Utc::now().to_rfc3339(),
        };
        file.set_len(0)?;
        file.write_all(serde_json::to_string(&owner)?.as_bytes())?;
        file.sync_all()?;
        debug!("acquired profile lock {}", lock_path.display());
        Ok(Self {
            lock_file: file,
            path: lock_path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the owner record of the lock at `lock_path`, if any was written.
    pub fn owner(lock_path: &Path) -> Result<Option<LockOwner>, StoreError> {
        if !lock_path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(lock_path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&content)?))
    }
}

impl Drop for ProfileLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}

fn open_lock_file(lock_path: &Path) -> Result<File, StoreError> {
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(lock_path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("p").join(".lock");

        {
            let lock = ProfileLock::acquire(&lock_path).unwrap();
            assert!(lock.path().exists());
        }
    }

    #[test]
    fn try_acquire_returns_none_when_held() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join(".lock");

        let _lock = ProfileLock::acquire(&lock_path).unwrap();
        let result = ProfileLock::try_acquire(&lock_path).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn lock_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join(".lock");

        {
            let _lock = ProfileLock::acquire(&lock_path).unwrap();
        }

        let lock2 = ProfileLock::try_acquire(&lock_path).unwrap();
        assert!(lock2.is_some());
    }

    #[test]
    fn owner_record_names_this_process() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join(".lock");
        assert!(ProfileLock::owner(&lock_path).unwrap().is_none());

        let _lock = ProfileLock::acquire(&lock_path).unwrap();
        let owner = ProfileLock::owner(&lock_path).unwrap().unwrap();
        assert_eq!(owner.pid, std::process::id());
    }

    #[test]
    fn try_acquire_reports_io_failures() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();

        let result = ProfileLock::try_acquire(&blocker.join(".lock"));
        assert!(matches!(result, Err(StoreError::Io(_))));
    }
}
