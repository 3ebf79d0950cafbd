//! Identity tables for objdb.
//!
//! An identity table hands out object identifiers and maps each one to the
//! physical position of its current record. Object and class identifiers
//! live in separate tables: every table is generic over exactly one
//! [`Oid`](objdb_types::Oid) kind, so the two namespaces can never be mixed.
//!
//! # Lifecycle
//!
//! ```text
//! allocate ──> Allocated ──bind──> Bound ──bind──> Bound
//!                  │                 │
//!                  └──invalidate──> Deleted
//! ```
//!
//! Values are allocated strictly monotonically starting at 1 and are never
//! reused, even after invalidation. Value 0 is the null identifier and never
//! resolves.
//!
//! # Backends
//!
//! - [`InMemoryIdentityTable`] -- for tests and in-memory databases
//! - [`PersistentIdentityTable`] -- fixed-width, CRC-checked records on a
//!   storage channel

pub mod error;
pub mod manager;
pub mod memory;
pub mod persistent;
pub mod table;

pub use error::{OidError, OidResult};
pub use manager::IdentityManager;
pub use memory::InMemoryIdentityTable;
pub use persistent::PersistentIdentityTable;
pub use table::{IdentityTable, OidState};
