//! Foundation types for objdb.
//!
//! This crate provides the identity and addressing types shared by every
//! other objdb crate. It has no storage logic of its own.
//!
//! # Key Types
//!
//! - [`ObjectOid`] -- Identifier of a stored object instance
//! - [`ClassOid`] -- Identifier of a stored class definition
//! - [`Oid`] -- Trait implemented by both identifier kinds
//! - [`AnyOid`] -- Kind-tagged identifier for heterogeneous contexts
//! - [`Position`] -- Absolute byte offset inside a storage channel
//! - [`TypeId`] -- Small integer naming a type descriptor

pub mod error;
pub mod oid;
pub mod position;
pub mod type_id;

pub use error::TypeError;
pub use oid::{AnyOid, ClassOid, ObjectOid, Oid, OidKind};
pub use position::Position;
pub use type_id::TypeId;
