//! Type registry for objdb.
//!
//! Decides how any value is represented in the store. A runtime type is
//! described by a [`TypeInfo`] (Rust types obtain theirs through the
//! [`Describe`] trait) and resolved by a [`TypeRegistry`] into a canonical,
//! shared [`TypeDescriptor`].
//!
//! # Resolution Rules
//!
//! 1. Enums get a descriptor of kind [`TypeKind::Enum`] named after the enum.
//! 2. Names matching a built-in return the built-in singleton.
//! 3. Arrays get a descriptor whose element type is resolved recursively.
//! 4. Map-capable types share the built-in Map descriptor.
//! 5. Collection-capable types share the built-in Collection descriptor.
//! 6. Everything else is a non-native (application) type.
//!
//! Every non-built-in resolution is cached by canonical name for the life of
//! the registry. Arrays, enums and non-native types receive a dynamic
//! [`TypeId`](objdb_types::TypeId); the dynamic part of a registry can be
//! saved to and reloaded from a storage channel (see [`catalog`]).

pub mod catalog;
pub mod descriptor;
pub mod error;
pub mod info;
pub mod kind;
pub mod registry;

pub use catalog::CatalogEntry;
pub use descriptor::TypeDescriptor;
pub use error::{MetaError, MetaResult};
pub use info::{Capability, Describe, TypeInfo, TypeShape};
pub use kind::{NativeBaseCategory, TypeKind};
pub use registry::TypeRegistry;
