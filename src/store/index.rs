//! The secondary index.
//!
//! One structure per collection, persisted as a single JSON file next to the
//! record files. It answers three questions without opening record files:
//! which ids exist (and how to sort/label them), which id holds a given
//! natural-key value, and which ids belong to a given bucket value.
//!
//! All maps are ordered so that serialization is deterministic and two
//! indexes can be compared structurally regardless of insertion order. The
//! maintained invariants:
//!
//! 1. Every id in `by_id` has a record file on disk (eventually: a crash
//!    between the record and index renames is healed by the reconciler).
//! 2. A natural-key value maps to at most one id.
//! 3. `last_id` never decreases and is never below the largest id present.
//! 4. Bucket sets only contain ids whose entry currently has that value;
//!    [`CollectionIndex::insert`] releases stale memberships and adds new
//!    ones within the same mutation.

use crate::model::IndexEntry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionIndex {
    /// Highest identifier ever issued. Monotonic; deletion never lowers it.
    pub last_id: u64,
    /// Identifier → metadata snapshot.
    #[serde(default)]
    pub by_id: BTreeMap<u64, IndexEntry>,
    /// Key name → normalized value → identifier.
    #[serde(default)]
    pub by_natural_key: BTreeMap<String, BTreeMap<String, u64>>,
    /// Bucket name → value → identifier set.
    #[serde(default)]
    pub by_bucket: BTreeMap<String, BTreeMap<String, BTreeSet<u64>>>,
}

impl CollectionIndex {
    /// Issue the next identifier.
    pub fn allocate_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    /// The id currently holding `value` under `key`, if any.
    pub fn holder(&self, key: &str, value: &str) -> Option<u64> {
        self.by_natural_key.get(key)?.get(value).copied()
    }

    /// Ids belonging to `value` under `bucket`, ascending.
    pub fn bucket_members(&self, bucket: &str, value: &str) -> Vec<u64> {
        self.by_bucket
            .get(bucket)
            .and_then(|values| values.get(value))
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Insert or replace the entry for `entry.id`, releasing any key and
    /// bucket memberships the previous snapshot held but the new one does
    /// not. `last_id` is raised if the entry's id is ahead of it.
    pub fn insert(&mut self, entry: IndexEntry) {
        self.remove(entry.id);
        if entry.id > self.last_id {
            self.last_id = entry.id;
        }
        for (key, value) in &entry.keys {
            self.by_natural_key
                .entry(key.clone())
                .or_default()
                .insert(value.clone(), entry.id);
        }
        for (bucket, value) in &entry.buckets {
            self.by_bucket
                .entry(bucket.clone())
                .or_default()
                .entry(value.clone())
                .or_default()
                .insert(entry.id);
        }
        self.by_id.insert(entry.id, entry);
    }

    /// Remove `id` from every structure. Returns the removed snapshot, or
    /// `None` if the id was not present. Empty inner maps are pruned so a
    /// long-lived index stays structurally equal to a freshly rebuilt one.
    pub fn remove(&mut self, id: u64) -> Option<IndexEntry> {
        let entry = self.by_id.remove(&id)?;

        for (key, value) in &entry.keys {
            if let Some(values) = self.by_natural_key.get_mut(key) {
                // Only release the value if this id still owns it; an update
                // that moved the value to another id must not revoke it.
                if values.get(value) == Some(&id) {
                    values.remove(value);
                }
                if values.is_empty() {
                    self.by_natural_key.remove(key);
                }
            }
        }
        for (bucket, value) in &entry.buckets {
            if let Some(values) = self.by_bucket.get_mut(bucket) {
                if let Some(ids) = values.get_mut(value) {
                    ids.remove(&id);
                    if ids.is_empty() {
                        values.remove(value);
                    }
                }
                if values.is_empty() {
                    self.by_bucket.remove(bucket);
                }
            }
        }
        Some(entry)
    }

    /// True when the maps agree with `other`, ignoring `last_id` (a rebuild
    /// cannot know about issued-then-deleted identifiers).
    pub fn same_contents(&self, other: &CollectionIndex) -> bool {
        self.by_id == other.by_id
            && self.by_natural_key == other.by_natural_key
            && self.by_bucket == other.by_bucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(id: u64, keys: &[(&str, &str)], buckets: &[(&str, &str)]) -> IndexEntry {
        let now = Utc::now();
        IndexEntry {
            id,
            label: format!("record {}", id),
            created_at: now,
            updated_at: now,
            keys: keys
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            buckets: buckets
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn allocate_is_monotonic() {
        let mut index = CollectionIndex::default();
        assert_eq!(index.allocate_id(), 1);
        assert_eq!(index.allocate_id(), 2);

        index.insert(entry(2, &[], &[]));
        index.remove(2);
        assert_eq!(index.allocate_id(), 3);
    }

    #[test]
    fn insert_registers_keys_and_buckets() {
        let mut index = CollectionIndex::default();
        index.insert(entry(1, &[("phone", "9000000001")], &[("stage", "lead")]));

        assert_eq!(index.holder("phone", "9000000001"), Some(1));
        assert_eq!(index.bucket_members("stage", "lead"), vec![1]);
        assert_eq!(index.last_id, 1);
    }

    #[test]
    fn reinsert_releases_stale_memberships() {
        let mut index = CollectionIndex::default();
        index.insert(entry(1, &[("phone", "9000000001")], &[("stage", "lead")]));
        index.insert(entry(
            1,
            &[("phone", "9000000002")],
            &[("stage", "ongoing")],
        ));

        assert_eq!(index.holder("phone", "9000000001"), None);
        assert_eq!(index.holder("phone", "9000000002"), Some(1));
        assert!(index.bucket_members("stage", "lead").is_empty());
        assert_eq!(index.bucket_members("stage", "ongoing"), vec![1]);
    }

    #[test]
    fn remove_prunes_empty_maps() {
        let mut index = CollectionIndex::default();
        index.insert(entry(1, &[("phone", "9000000001")], &[("stage", "lead")]));
        index.remove(1);

        assert!(index.by_id.is_empty());
        assert!(index.by_natural_key.is_empty());
        assert!(index.by_bucket.is_empty());
        assert_eq!(index.last_id, 1);
    }

    #[test]
    fn remove_missing_id_is_none() {
        let mut index = CollectionIndex::default();
        assert!(index.remove(42).is_none());
    }

    #[test]
    fn bucket_sets_hold_multiple_ids() {
        let mut index = CollectionIndex::default();
        index.insert(entry(1, &[], &[("stage", "lead")]));
        index.insert(entry(2, &[], &[("stage", "lead")]));

        assert_eq!(index.bucket_members("stage", "lead"), vec![1, 2]);

        index.remove(1);
        assert_eq!(index.bucket_members("stage", "lead"), vec![2]);
    }

    #[test]
    fn same_contents_ignores_last_id() {
        let mut a = CollectionIndex::default();
        let mut b = CollectionIndex::default();
        let e = entry(1, &[("phone", "9000000001")], &[]);
        a.insert(e.clone());
        b.insert(e);
        a.last_id = 9;

        assert!(a.same_contents(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn serde_round_trip_is_stable() {
        let mut index = CollectionIndex::default();
        index.insert(entry(
            1,
            &[("phone", "9000000001"), ("email", "a@example.com")],
            &[("stage", "lead"), ("active", "true")],
        ));
        index.insert(entry(2, &[("phone", "9000000002")], &[("stage", "lead")]));

        let json = serde_json::to_string_pretty(&index).unwrap();
        let loaded: CollectionIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(index, loaded);
    }
}
