//! # Domain Model: Records and Index Snapshots
//!
//! A collection stores one kind of record. What makes a struct storable is
//! the [`Record`] trait: it tells the store which fields are natural keys
//! (unique across the collection), which are bucket attributes (low-cardinality
//! grouping values), and how to build the lightweight [`IndexEntry`] snapshot
//! that lets listings run without opening every record file.
//!
//! ## Natural Keys
//!
//! A natural key is a record field whose value must be unique across the
//! collection when non-empty (email, username, phone digits). Keys are always
//! compared in normalized form; [`Record::normalize_key`] must apply the same
//! normalization the record applies to its own values, so a caller-supplied
//! probe value and a stored value can never disagree on case or formatting.
//!
//! ## Bucket Attributes
//!
//! Buckets group record ids by a low-cardinality value (stage, role, an
//! active flag rendered as `"true"`/`"false"`). They exist so `list` can
//! narrow to a subset without scanning the whole collection.
//!
//! ## Identity and Timestamps
//!
//! - `id` is a positive integer, assigned once by the store from the index's
//!   `last_id` counter and never reused, even after deletion.
//! - `created_at` is honored from the caller on first insert if present,
//!   stamped otherwise, and preserved on every update.
//! - `updated_at` is always stamped by the store; callers cannot set it.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema contract between a record kind and the generic store.
///
/// Implementations are plain serde-able structs; the store never needs to
/// know their payload fields, only identity, timestamps, keys and buckets.
pub trait Record: Clone + Serialize + DeserializeOwned {
    /// Collection name, used in audit events and log messages.
    const KIND: &'static str;

    /// Natural-key names, in the priority order `find_by_any` probes them.
    const KEYS: &'static [&'static str];

    /// Bucket attribute names.
    const BUCKETS: &'static [&'static str];

    /// The record's identifier. Zero means "not yet assigned".
    fn id(&self) -> u64;

    /// Called exactly once by the store when inserting a record without an id.
    fn assign_id(&mut self, id: u64);

    fn created_at(&self) -> Option<DateTime<Utc>>;
    fn updated_at(&self) -> Option<DateTime<Utc>>;

    fn stamp_created(&mut self, at: DateTime<Utc>);
    fn stamp_updated(&mut self, at: DateTime<Utc>);

    /// The record's current non-empty natural-key values, normalized.
    /// Empty values are omitted entirely; an empty key reserves nothing.
    fn natural_keys(&self) -> BTreeMap<&'static str, String>;

    /// The record's current bucket values.
    fn buckets(&self) -> BTreeMap<&'static str, String>;

    /// Display label cached in the index so listings can sort and render
    /// without opening record files.
    fn label(&self) -> String;

    /// Concatenated display fields scanned by the free-text list filter.
    fn search_text(&self) -> String;

    /// Normalize a probe value for `key` the same way the record normalizes
    /// its own value for that key.
    fn normalize_key(key: &str, raw: &str) -> String;
}

/// Lightweight metadata snapshot of one record, held in the index under
/// `by_id`. Carries everything listing and update-diffing need; the previous
/// record file is never opened to compute an index delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: u64,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Normalized natural-key values this record currently holds.
    #[serde(default)]
    pub keys: BTreeMap<String, String>,
    /// Bucket values this record currently belongs to.
    #[serde(default)]
    pub buckets: BTreeMap<String, String>,
}

impl IndexEntry {
    /// Build the snapshot for a record. `fallback` fills timestamps for
    /// records that predate stamping; the store always stamps before calling.
    pub fn of<R: Record>(record: &R, fallback: DateTime<Utc>) -> Self {
        IndexEntry {
            id: record.id(),
            label: record.label(),
            created_at: record.created_at().unwrap_or(fallback),
            updated_at: record.updated_at().unwrap_or(fallback),
            keys: record
                .natural_keys()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            buckets: record
                .buckets()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }
}
