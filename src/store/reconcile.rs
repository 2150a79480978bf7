//! Index reconciliation.
//!
//! The records directory is the source of truth; the index file is a cache
//! over it. A crash between the record-file rename and the index-file rename
//! leaves the two out of step, and nothing in the normal read/write path
//! will ever notice, since reads trust the index and writes replace it
//! wholesale.
//! `verify_index` is the recovery path: rebuild the index purely from the
//! record files, compare structurally, and (on request) overwrite the
//! persisted index with the reconstruction.

use crate::audit::AuditEvent;
use crate::error::Result;
use crate::model::{IndexEntry, Record};
use crate::store::collection::{Collection, PersistedIndex, RECORD_PREFIX};
use crate::store::index::CollectionIndex;
use chrono::Utc;
use std::fs;
use tracing::{info, warn};

/// Outcome of [`Collection::verify_index`].
#[derive(Debug, Default)]
pub struct VerifyReport {
    /// True when the persisted index structurally matched the rebuilt one.
    pub consistent: bool,
    /// True when the persisted index was overwritten with the rebuilt one.
    pub repaired: bool,
    pub records_scanned: usize,
    /// Record files skipped because their payload would not parse.
    pub corrupt_records: usize,
}

impl<R: Record> Collection<R> {
    /// Reconstruct the index by scanning every record file, ignoring the
    /// persisted index entirely. Key and bucket memberships are re-derived
    /// from each record's current field values; `last_id` is the highest
    /// identifier observed.
    pub fn rebuild_from_records(&self) -> Result<CollectionIndex> {
        let (index, _, _) = self.scan_records()?;
        Ok(index)
    }

    /// Compare the persisted index against a reconstruction from the records
    /// directory. On mismatch the report comes back degraded; the persisted
    /// index is only overwritten when `auto_repair` is set. Runs under the
    /// region lock so a concurrent writer cannot interleave between the
    /// comparison and the repair.
    pub fn verify_index(&self, auto_repair: bool) -> Result<VerifyReport> {
        let _guard = self.lock.acquire()?;

        let persisted = self.persisted_index()?;
        let (mut rebuilt, records_scanned, corrupt_records) = self.scan_records()?;

        let consistent = match &persisted {
            PersistedIndex::Valid(index) => {
                index.same_contents(&rebuilt) && index.last_id >= rebuilt.last_id
            }
            // No index file is fine for an empty collection only.
            PersistedIndex::Missing => rebuilt.by_id.is_empty(),
            PersistedIndex::Corrupt => false,
        };

        let mut report = VerifyReport {
            consistent,
            repaired: false,
            records_scanned,
            corrupt_records,
        };

        if consistent {
            return Ok(report);
        }

        warn!(kind = R::KIND, "index does not match records directory");
        if !auto_repair {
            return Ok(report);
        }

        // Never let a repair regress the identifier counter: deleted records
        // leave no file behind, but their ids must stay retired.
        if let PersistedIndex::Valid(index) = &persisted {
            if index.last_id > rebuilt.last_id {
                rebuilt.last_id = index.last_id;
            }
        }
        self.store_index(&rebuilt)?;
        report.repaired = true;
        info!(kind = R::KIND, records = records_scanned, "index rebuilt");

        if let Some(audit) = self.audit() {
            audit.append(&AuditEvent::IndexRepaired {
                kind: R::KIND.to_string(),
                records: records_scanned,
                at: Utc::now(),
            })?;
        }
        Ok(report)
    }

    /// Scan the records directory, returning the reconstructed index plus
    /// (files scanned, files skipped as corrupt). Ids are processed in
    /// ascending order so reconstruction is deterministic.
    fn scan_records(&self) -> Result<(CollectionIndex, usize, usize)> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(RECORD_PREFIX) {
                continue;
            }
            if let Some(id) = Self::parse_record_id(name) {
                ids.push(id);
            }
        }
        ids.sort_unstable();

        let mut index = CollectionIndex::default();
        let mut scanned = 0;
        let mut corrupt = 0;
        let fallback = Utc::now();

        for id in ids {
            scanned += 1;
            let content = fs::read_to_string(self.record_path(id))?;
            let record: R = match serde_json::from_str(&content) {
                Ok(record) => record,
                Err(err) => {
                    corrupt += 1;
                    warn!(
                        kind = R::KIND,
                        id,
                        error = %err,
                        "skipping corrupt record during rebuild"
                    );
                    continue;
                }
            };
            index.insert(IndexEntry::of(&record, fallback));
        }
        Ok((index, scanned, corrupt))
    }
}
