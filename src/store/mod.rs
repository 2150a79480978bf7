//! # Storage Layer
//!
//! A collection is a directory of files standing in for a database table:
//!
//! ```text
//! customers/
//! ├── index.json          # secondary index (last_id, by_id, keys, buckets)
//! ├── .lock               # region lock file (contents irrelevant)
//! ├── audit.log           # optional append-only domain events, one per line
//! └── rec-000001.json     # one file per record, zero-padded id
//! ```
//!
//! ## Write discipline
//!
//! Every mutation runs under the region lock and performs the same cycle:
//! load index → validate/diff → atomic-rename the record file → atomic-rename
//! the index file. Readers take no lock; atomic rename guarantees they see a
//! complete snapshot of whichever file they open.
//!
//! ## Crash windows
//!
//! The two renames are not one transaction. A crash between them leaves the
//! record files and the index disagreeing. That is the only inconsistency this
//! design can produce, and the reconciler's whole job: the records directory
//! is the source of truth, and [`Collection::verify_index`] rebuilds the
//! index from it.
//!
//! ## Serialization
//!
//! All mutations against one collection are serialized through a single
//! exclusive lock. This is a deliberate trade-off, not an oversight: the
//! store targets single-process, single-host deployments where correctness
//! under crashes matters more than writer throughput.

pub mod atomic;
pub mod collection;
pub mod index;
pub mod lock;
pub mod reconcile;

pub use collection::{Collection, ListFilter, ListOrder};
pub use index::CollectionIndex;
pub use lock::StoreLock;
pub use reconcile::VerifyReport;
