//! Append-only audit log.
//!
//! One self-contained JSON entry per line. Appends run under the log's own
//! lock file, a separate scope from the store mutation lock, since an audit
//! entry does not need to become visible atomically with the record it
//! describes. Entries are never rewritten; a reader tailing the file sees
//! history in append order.

use crate::error::Result;
use crate::store::lock::StoreLock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    RecordSaved {
        kind: String,
        id: u64,
        at: DateTime<Utc>,
    },
    RecordDeleted {
        kind: String,
        id: u64,
        at: DateTime<Utc>,
    },
    StageChanged {
        id: u64,
        from: String,
        to: String,
        at: DateTime<Utc>,
    },
    IndexRepaired {
        kind: String,
        records: usize,
        at: DateTime<Utc>,
    },
}

pub struct AuditLog {
    path: PathBuf,
    lock: StoreLock,
}

impl AuditLog {
    /// Open a log at `path`. The lock file lives next to it.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock = StoreLock::new(path.with_extension("lock"));
        Self { path, lock }
    }

    /// Append one entry. Blocks on the log's lock; the write itself is a
    /// single line so concurrent tailers never see a torn entry.
    pub fn append(&self, event: &AuditEvent) -> Result<()> {
        let _guard = self.lock.acquire()?;
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Read every entry in append order. Unparseable lines are logged and
    /// skipped rather than failing the whole read.
    pub fn entries(&self) -> Result<Vec<AuditEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&self.path)?;
        let mut events = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(event) => events.push(event),
                Err(err) => {
                    warn!(path = %self.path.display(), error = %err, "skipping bad audit line");
                }
            }
        }
        Ok(events)
    }
}
