//! The generic collection store.
//!
//! [`Collection<R>`] owns one directory and everything in it: the record
//! files, the index file, and the lock file. Callers never touch those files
//! directly; every read goes through `get`/`list`/`find_by_key`, and every
//! mutation goes through `save`/`delete` under the region lock.
//!
//! Reads are lock-free: because every file is replaced by atomic rename, a
//! reader racing a writer sees either the old or the new contents of any one
//! file, never a mix. The record-file and index-file renames are two separate
//! steps, so a crash between them can leave the pair inconsistent; the
//! reconciler heals that from the records directory, which is the source of
//! truth.

use crate::audit::{AuditEvent, AuditLog};
use crate::error::{Result, StoreError};
use crate::model::{IndexEntry, Record};
use crate::store::atomic::atomic_write;
use crate::store::index::CollectionIndex;
use crate::store::lock::StoreLock;
use chrono::Utc;
use std::fs;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

pub(super) const INDEX_FILE: &str = "index.json";
pub(super) const LOCK_FILE: &str = ".lock";
pub(super) const RECORD_PREFIX: &str = "rec-";

/// Sort order for [`Collection::list`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Filters applied by [`Collection::list`].
///
/// The first bucket constraint narrows the candidate set through the index;
/// remaining constraints and the free-text needle are applied against each
/// loaded record.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    buckets: Vec<(String, String)>,
    text: Option<String>,
    order: ListOrder,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bucket(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.buckets.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive substring match over the record's display fields.
    pub fn text(mut self, needle: impl Into<String>) -> Self {
        self.text = Some(needle.into());
        self
    }

    pub fn order(mut self, order: ListOrder) -> Self {
        self.order = order;
        self
    }
}

/// State of the persisted index file, as found on disk.
pub(super) enum PersistedIndex {
    Missing,
    Valid(CollectionIndex),
    Corrupt,
}

/// A file-backed, indexed store for one kind of record.
pub struct Collection<R: Record> {
    pub(super) dir: PathBuf,
    pub(super) file_ext: String,
    pub(super) lock: StoreLock,
    audit: Option<AuditLog>,
    corrupt_reads: AtomicU64,
    _kind: PhantomData<R>,
}

impl<R: Record> Collection<R> {
    /// Open (creating if necessary) the collection rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let lock = StoreLock::new(dir.join(LOCK_FILE));
        Ok(Self {
            dir,
            file_ext: ".json".to_string(),
            lock,
            audit: None,
            corrupt_reads: AtomicU64::new(0),
            _kind: PhantomData,
        })
    }

    pub fn with_file_ext(mut self, ext: &str) -> Self {
        if ext.starts_with('.') {
            self.file_ext = ext.to_string();
        } else {
            self.file_ext = format!(".{}", ext);
        }
        self
    }

    /// Attach an audit log. Domain events are appended after each mutation.
    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn audit(&self) -> Option<&AuditLog> {
        self.audit.as_ref()
    }

    /// Number of record reads that found an unparseable payload. Corrupt
    /// records are reported as absent; this counter is the side channel that
    /// makes the distinction observable.
    pub fn corrupt_reads(&self) -> u64 {
        self.corrupt_reads.load(Ordering::Relaxed)
    }

    pub(super) fn record_path(&self, id: u64) -> PathBuf {
        self.dir
            .join(format!("{}{:06}{}", RECORD_PREFIX, id, self.file_ext))
    }

    /// Parse a record id out of a directory entry name. Temp files carry a
    /// leading dot and never match the prefix.
    pub(super) fn parse_record_id(name: &str) -> Option<u64> {
        let stem = std::path::Path::new(name).file_stem()?.to_str()?;
        stem.strip_prefix(RECORD_PREFIX)?.parse().ok()
    }

    /// Read one record file directly. Missing and corrupt files both come
    /// back as `None`; corruption is logged and counted, never thrown.
    pub fn get(&self, id: u64) -> Result<Option<R>> {
        let path = self.record_path(id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            // Reads take no lock, so the file may vanish under us.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_str(&content) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                self.corrupt_reads.fetch_add(1, Ordering::Relaxed);
                warn!(
                    kind = R::KIND,
                    id,
                    error = %err,
                    "corrupt record payload, treating as absent"
                );
                Ok(None)
            }
        }
    }

    /// Look up a record by one natural key. The probe value is normalized
    /// exactly as the record kind normalizes its own values.
    pub fn find_by_key(&self, key: &str, value: &str) -> Result<Option<R>> {
        let needle = R::normalize_key(key, value);
        if needle.is_empty() {
            return Ok(None);
        }
        let index = self.load_index()?;
        match index.holder(key, &needle) {
            Some(id) => self.get(id),
            None => Ok(None),
        }
    }

    /// Try every natural key of the kind, in declared priority order, until
    /// one resolves to an existing record.
    pub fn find_by_any(&self, value: &str) -> Result<Option<R>> {
        let index = self.load_index()?;
        for &key in R::KEYS {
            let needle = R::normalize_key(key, value);
            if needle.is_empty() {
                continue;
            }
            if let Some(id) = index.holder(key, &needle) {
                if let Some(record) = self.get(id)? {
                    return Ok(Some(record));
                }
            }
        }
        Ok(None)
    }

    /// Load records matching `filter`, newest-first unless ordered otherwise.
    pub fn list(&self, filter: &ListFilter) -> Result<Vec<R>> {
        let index = self.load_index()?;

        let candidates: Vec<u64> = match filter.buckets.first() {
            Some((bucket, value)) => index.bucket_members(bucket, value),
            None => index.by_id.keys().copied().collect(),
        };

        let needle = filter.text.as_ref().map(|t| t.to_lowercase());
        let mut records = Vec::new();
        for id in candidates {
            let Some(record) = self.get(id)? else {
                continue;
            };
            let buckets = record.buckets();
            if !filter.buckets.iter().skip(1).all(|(name, value)| {
                buckets.get(name.as_str()).map(String::as_str) == Some(value.as_str())
            }) {
                continue;
            }
            if let Some(needle) = &needle {
                if !record.search_text().to_lowercase().contains(needle) {
                    continue;
                }
            }
            records.push(record);
        }

        records.sort_by_key(|r| r.created_at().map(|t| t.timestamp_millis()).unwrap_or(0));
        if filter.order == ListOrder::NewestFirst {
            records.reverse();
        }
        Ok(records)
    }

    /// Insert or update a record. The only mutating entry point besides
    /// [`Collection::delete`]; the whole read-modify-write cycle runs under
    /// the region lock.
    ///
    /// All of the record's proposed natural keys are checked against the
    /// current index (excluding the record's own id) before anything is
    /// written; one collision fails the whole operation and leaves both the
    /// record file and the index untouched.
    pub fn save(&self, mut record: R) -> Result<R> {
        let _guard = self.lock.acquire()?;
        let mut index = self.load_index()?;
        let now = Utc::now();

        let previous = if record.id() > 0 {
            index.by_id.get(&record.id()).cloned()
        } else {
            let id = index.allocate_id();
            record.assign_id(id);
            None
        };

        let keys = record.natural_keys();
        for &key in R::KEYS {
            if let Some(value) = keys.get(key) {
                if let Some(holder) = index.holder(key, value) {
                    if holder != record.id() {
                        return Err(StoreError::Conflict {
                            key,
                            value: value.clone(),
                            holder,
                        });
                    }
                }
            }
        }

        match &previous {
            // Updates keep the stored creation time regardless of input.
            Some(prev) => record.stamp_created(prev.created_at),
            None => {
                if record.created_at().is_none() {
                    record.stamp_created(now);
                }
            }
        }
        record.stamp_updated(now);

        let payload = serde_json::to_vec_pretty(&record)?;
        atomic_write(&self.record_path(record.id()), &payload)?;

        index.insert(IndexEntry::of(&record, now));
        self.store_index(&index)?;

        if let Some(audit) = &self.audit {
            audit.append(&AuditEvent::RecordSaved {
                kind: R::KIND.to_string(),
                id: record.id(),
                at: now,
            })?;
        }
        Ok(record)
    }

    /// Remove a record and all of its index memberships. Deleting an id that
    /// does not exist is a no-op returning `false`.
    pub fn delete(&self, id: u64) -> Result<bool> {
        let _guard = self.lock.acquire()?;
        let mut index = self.load_index()?;

        if index.remove(id).is_none() {
            return Ok(false);
        }
        self.store_index(&index)?;

        let path = self.record_path(id);
        if path.exists() {
            fs::remove_file(&path)?;
        }

        if let Some(audit) = &self.audit {
            audit.append(&AuditEvent::RecordDeleted {
                kind: R::KIND.to_string(),
                id,
                at: Utc::now(),
            })?;
        }
        Ok(true)
    }

    /// The index file as found on disk. IO errors propagate; a payload that
    /// fails to parse is reported as [`PersistedIndex::Corrupt`], never as an
    /// empty index.
    pub(super) fn persisted_index(&self) -> Result<PersistedIndex> {
        let path = self.dir.join(INDEX_FILE);
        if !path.exists() {
            return Ok(PersistedIndex::Missing);
        }
        let content = fs::read_to_string(&path)?;
        match serde_json::from_str(&content) {
            Ok(index) => Ok(PersistedIndex::Valid(index)),
            Err(err) => {
                warn!(kind = R::KIND, error = %err, "corrupt index payload");
                Ok(PersistedIndex::Corrupt)
            }
        }
    }

    /// The working index: the persisted one when readable, a fresh rebuild
    /// from the records directory when corrupt, empty when absent.
    pub(super) fn load_index(&self) -> Result<CollectionIndex> {
        match self.persisted_index()? {
            PersistedIndex::Valid(index) => Ok(index),
            PersistedIndex::Missing => Ok(CollectionIndex::default()),
            PersistedIndex::Corrupt => {
                warn!(kind = R::KIND, "rebuilding index from records directory");
                self.rebuild_from_records()
            }
        }
    }

    pub(super) fn store_index(&self, index: &CollectionIndex) -> Result<()> {
        let payload = serde_json::to_vec_pretty(index)?;
        atomic_write(&self.dir.join(INDEX_FILE), &payload)
    }
}
