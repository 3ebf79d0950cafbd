use std::fmt;

use serde::{Deserialize, Serialize};

/// Small integer naming a type descriptor.
///
/// Built-in descriptors use fixed values below
/// [`TypeId::FIRST_DYNAMIC`]; ids at or above it are handed out by a type
/// registry to array, enum and application types on first sight.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(u32);

impl TypeId {
    /// First id assigned to a type discovered at run time.
    pub const FIRST_DYNAMIC: TypeId = TypeId(1000);

    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Returns `true` for ids assigned at run time.
    pub const fn is_dynamic(&self) -> bool {
        self.0 >= Self::FIRST_DYNAMIC.0
    }

    /// The id following this one.
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
