//! # Dossier
//!
//! A file-backed, indexed record store for entity collections: user
//! accounts, customer leads, and anything else that would otherwise live in
//! a small database table. There is no database engine underneath: a
//! collection is a directory of JSON files, an index file, and a lock file,
//! and the store provides the guarantees a database would (uniqueness
//! constraints, atomic visibility of writes, crash recovery, consistent
//! secondary lookups) out of those three ingredients.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Lifecycle layer (lifecycle.rs)                             │
//! │  - Ordered stages, per-transition gates, append-only history│
//! │  - Built on get/save; never touches files or the index      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Collection API (store/collection.rs)                       │
//! │  - get / list / find_by_key / save / delete / verify_index  │
//! │  - Mutations serialized under one exclusive region lock     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Primitives (store/atomic.rs, store/lock.rs, store/index.rs)│
//! │  - Atomic rename writes, advisory file lock, secondary index│
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Record kinds plug into the generic [`Collection`](store::Collection)
//! through the [`Record`](model::Record) trait, which declares their natural
//! keys (unique, e.g. email or phone digits) and bucket attributes
//! (low-cardinality grouping values, e.g. stage or role). Input arrives as a
//! per-kind draft struct and is validated into canonical form before any I/O
//! happens.
//!
//! ## Example
//!
//! ```no_run
//! use dossier::records::{Customer, CustomerDraft};
//! use dossier::store::Collection;
//!
//! # fn main() -> dossier::Result<()> {
//! let customers: Collection<Customer> = Collection::open("data/customers")?;
//!
//! let draft = CustomerDraft {
//!     name: "Asha Nair".to_string(),
//!     district: "Kollam".to_string(),
//!     phone: "+91 90000 00001".to_string(),
//!     ..CustomerDraft::default()
//! };
//! let saved = customers.save(draft.validate()?)?;
//!
//! let found = customers.find_by_key("phone", "+91 90000 00001")?;
//! assert_eq!(found.map(|c| c.id), Some(saved.id));
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`store`]: the collection store and its primitives
//! - [`model`]: the [`Record`](model::Record) trait and index snapshots
//! - [`records`]: concrete record kinds and their drafts
//! - [`lifecycle`]: the stage machine layered on customer records
//! - [`codec`]: field normalization and validation helpers
//! - [`audit`]: append-only domain-event log
//! - [`error`]: error types

pub mod audit;
pub mod codec;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod records;
pub mod store;

pub use error::{Result, StoreError};
pub use model::Record;
pub use store::{Collection, ListFilter, ListOrder, VerifyReport};
