//! Atomic file replacement.
//!
//! Readers of a record or index file must never observe a half-written
//! payload. Every write goes to a fresh temporary file in the same directory
//! as the target (rename is only atomic within one filesystem), is synced,
//! and is then renamed onto the target. Any failure before the rename leaves
//! the target untouched and removes the temporary file.

use crate::error::{Result, StoreError};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

/// Replace the contents of `path` with `bytes`, or leave `path` untouched.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().ok_or_else(|| {
        StoreError::Store(format!("no parent directory for {}", path.display()))
    })?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("write");
    let tmp = dir.join(format!(".{}-{}.tmp", name, Uuid::new_v4()));

    let attempt = (|| -> Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)?;
        Ok(())
    })();

    if attempt.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    attempt
}
