//! Object record storage for objdb.
//!
//! This crate is the record layer between the type registry, the identity
//! tables and a storage channel. A class is registered once per canonical
//! type name and receives a [`ClassOid`](objdb_types::ClassOid); every
//! object record is written as a frame on the record channel and receives
//! an [`ObjectOid`](objdb_types::ObjectOid) bound to the frame's position.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait through [`RecordStore`]:
//!
//! - [`InMemoryObjectStore`] -- in-memory identity tables and channel
//! - [`FileObjectStore`] -- a directory of files laid out by [`StoreConfig`]
//!
//! # Design Rules
//!
//! 1. Records are append-only. An update writes a new frame and rebinds.
//! 2. Write-then-bind: the record is written before its identifier exists.
//! 3. Deleted identifiers are never reused.
//! 4. The store never interprets object data.

pub mod config;
pub mod error;
pub mod record;
pub mod store;
pub mod traits;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use record::{ClassRecord, ObjectRecord};
pub use store::{load_registry, save_registry, FileObjectStore, InMemoryObjectStore, RecordStore};
pub use traits::ObjectStore;
