//! Exclusive region lock.
//!
//! One lock file per store. Acquisition blocks until the advisory lock is
//! held exclusively, both across threads and across processes; the file's
//! contents are irrelevant. The lock guards an entire read-modify-write
//! cycle, so all mutations against a collection are fully serialized. There
//! is no retry or timeout here: a caller wanting bounded waiting must wrap
//! the call externally.

use crate::error::{Result, StoreError};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use tracing::debug;

pub struct StoreLock {
    path: PathBuf,
}

/// Held lock. Released on drop, on every exit path.
pub struct LockGuard {
    file: File,
}

impl StoreLock {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Block until the lock is held exclusively.
    pub fn acquire(&self) -> Result<LockGuard> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| {
                StoreError::Lock(format!("cannot open {}: {}", self.path.display(), e))
            })?;

        file.lock_exclusive().map_err(|e| {
            StoreError::Lock(format!("cannot lock {}: {}", self.path.display(), e))
        })?;

        debug!(path = %self.path.display(), "lock acquired");
        Ok(LockGuard { file })
    }

    /// Run `f` while holding the lock. The lock is released when `f`
    /// returns, whether it succeeded or failed.
    pub fn with_lock<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let _guard = self.acquire()?;
        f()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
