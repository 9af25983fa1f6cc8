//! Storage directory lock
//!
//! An advisory exclusive lock on `<storage>/.update.lock`. Every update cycle
//! holds it, so `ipgeo update` and a running server never write the archive
//! or temp directories of the same storage directory at once. The OS releases
//! the lock when the holder exits, crashed or not, so a leftover file never
//! blocks later runs.

use std::fs::{self, File, TryLockError};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::UPDATE_LOCK_FILENAME;
use crate::errors::{GeoIpError, Result};

#[derive(Debug)]
pub struct StorageLock {
    file: File,
    path: PathBuf,
}

impl StorageLock {
    /// `Ok(None)` when another holder (this process or another one) has it
    pub fn try_acquire(storage_dir: &Path) -> Result<Option<Self>> {
        fs::create_dir_all(storage_dir).map_err(|e| {
            GeoIpError::file_operation(format!(
                "failed to create {}: {}",
                storage_dir.display(),
                e
            ))
        })?;

        let path = storage_dir.join(UPDATE_LOCK_FILENAME);
        let mut file = File::options()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| {
                GeoIpError::file_operation(format!("failed to open {}: {}", path.display(), e))
            })?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                debug!("{} is held by another updater", path.display());
                return Ok(None);
            }
            Err(TryLockError::Error(e)) => {
                return Err(GeoIpError::file_operation(format!(
                    "failed to lock {}: {}",
                    path.display(),
                    e
                )));
            }
        }

        // 记录持有者 PID，仅用于排查
        if let Err(e) = file
            .set_len(0)
            .and_then(|_| writeln!(file, "{}", std::process::id()))
        {
            warn!("Failed to write pid to {}: {}", path.display(), e);
        }
        debug!("Acquired {}", path.display());
        Ok(Some(Self { file, path }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StorageLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_refused_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().join("data");

        let held = StorageLock::try_acquire(&storage).unwrap().unwrap();
        assert!(held.path().ends_with(UPDATE_LOCK_FILENAME));
        assert!(StorageLock::try_acquire(&storage).unwrap().is_none());

        drop(held);
        assert!(StorageLock::try_acquire(&storage).unwrap().is_some());
    }

    #[test]
    fn test_lock_file_records_pid() {
        let dir = tempfile::tempdir().unwrap();
        let held = StorageLock::try_acquire(dir.path()).unwrap().unwrap();
        let content = fs::read_to_string(held.path()).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());
    }
}
