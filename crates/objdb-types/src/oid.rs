use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The two disjoint identifier namespaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OidKind {
    /// Identifies a stored object instance.
    Object,
    /// Identifies a stored class (type definition).
    Class,
}

impl OidKind {
    /// Textual prefix used by `Display` and `FromStr`.
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::Object => "oid",
            Self::Class => "coid",
        }
    }
}

impl fmt::Display for OidKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => write!(f, "object"),
            Self::Class => write!(f, "class"),
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Common behaviour of [`ObjectOid`] and [`ClassOid`].
///
/// The trait is sealed: the two kinds are the only identifier types, and code
/// generic over `O: Oid` can never mix them because each is its own type.
/// Value `0` is the null identifier and never names stored data.
pub trait Oid:
    sealed::Sealed
    + Copy
    + Eq
    + Ord
    + Hash
    + fmt::Debug
    + fmt::Display
    + Send
    + Sync
    + 'static
{
    /// Namespace of this identifier type.
    const KIND: OidKind;

    /// Build an identifier from its raw numeric value.
    fn from_value(value: u64) -> Self;

    /// The raw numeric value.
    fn value(&self) -> u64;

    /// The null identifier ("no object").
    fn null() -> Self {
        Self::from_value(0)
    }

    /// Returns `true` if this is the null identifier.
    fn is_null(&self) -> bool {
        self.value() == 0
    }
}

macro_rules! define_oid {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            /// Create an identifier from a raw value.
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Big-endian byte encoding.
            pub fn to_be_bytes(&self) -> [u8; 8] {
                self.0.to_be_bytes()
            }

            /// Decode from a big-endian slice of exactly 8 bytes.
            pub fn from_be_slice(bytes: &[u8]) -> Result<Self, TypeError> {
                let arr: [u8; 8] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
                    expected: 8,
                    actual: bytes.len(),
                })?;
                Ok(Self(u64::from_be_bytes(arr)))
            }
        }

        impl sealed::Sealed for $name {}

        impl Oid for $name {
            const KIND: OidKind = $kind;

            fn from_value(value: u64) -> Self {
                Self(value)
            }

            fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", $kind.prefix(), self.0)
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let invalid = || TypeError::InvalidOid {
                    kind: $kind,
                    input: s.to_string(),
                };
                let digits = s
                    .strip_prefix($kind.prefix())
                    .and_then(|rest| rest.strip_prefix(':'))
                    .unwrap_or(s);
                digits.parse::<u64>().map(Self).map_err(|_| invalid())
            }
        }
    };
}

define_oid!(
    /// Identifier of a stored object instance.
    ObjectOid,
    OidKind::Object
);

define_oid!(
    /// Identifier of a stored class definition.
    ClassOid,
    OidKind::Class
);

/// A kind-tagged identifier.
///
/// Used where a field may hold either kind (the generic `Oid` built-in
/// type). Equality compares kind first, so `Object(7) != Class(7)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnyOid {
    Object(ObjectOid),
    Class(ClassOid),
}

impl AnyOid {
    pub fn kind(&self) -> OidKind {
        match self {
            Self::Object(_) => OidKind::Object,
            Self::Class(_) => OidKind::Class,
        }
    }

    pub fn value(&self) -> u64 {
        match self {
            Self::Object(oid) => oid.value(),
            Self::Class(oid) => oid.value(),
        }
    }

    /// The object identifier, if this is one.
    pub fn as_object(&self) -> Option<ObjectOid> {
        match self {
            Self::Object(oid) => Some(*oid),
            Self::Class(_) => None,
        }
    }

    /// The class identifier, if this is one.
    pub fn as_class(&self) -> Option<ClassOid> {
        match self {
            Self::Class(oid) => Some(*oid),
            Self::Object(_) => None,
        }
    }
}

impl From<ObjectOid> for AnyOid {
    fn from(oid: ObjectOid) -> Self {
        Self::Object(oid)
    }
}

impl From<ClassOid> for AnyOid {
    fn from(oid: ClassOid) -> Self {
        Self::Class(oid)
    }
}

impl fmt::Display for AnyOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(oid) => write!(f, "{oid}"),
            Self::Class(oid) => write!(f, "{oid}"),
        }
    }
}
