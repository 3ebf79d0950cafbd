use std::fmt;

use serde::{Deserialize, Serialize};

use objdb_types::TypeId;

/// The representation category of a type descriptor.
///
/// Every built-in kind has a fixed [`TypeId`] (see [`TypeKind::builtin_id`]);
/// the values are part of the on-disk format and must never change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypeKind {
    Null,
    Boolean,
    /// `u8`
    Byte,
    /// `i8`
    SByte,
    /// `char`
    Character,
    /// `i16`
    Short,
    /// `u16`
    UShort,
    /// `i32`
    Integer,
    /// `u32`
    UInteger,
    /// `i64`
    Long,
    /// `u64`
    ULong,
    /// `f32`
    Float,
    /// `f64`
    Double,
    /// `i128`, 16 bytes.
    Decimal,
    /// `SystemTime`, stored as milliseconds since the epoch.
    Date,
    /// Either identifier kind, tagged.
    Oid,
    ObjectOid,
    ClassOid,
    String,
    Enum,
    Collection,
    GenericCollection,
    Array,
    Map,
    NonNative,
}

/// The native container family a type belongs to, if any.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NativeBaseCategory {
    None,
    Collection,
    GenericCollection,
    Map,
}

impl TypeKind {
    /// All built-in kinds, in id order.
    pub const ALL: [TypeKind; 25] = [
        Self::Null,
        Self::Boolean,
        Self::Byte,
        Self::SByte,
        Self::Character,
        Self::Short,
        Self::UShort,
        Self::Integer,
        Self::UInteger,
        Self::Long,
        Self::ULong,
        Self::Float,
        Self::Double,
        Self::Decimal,
        Self::Date,
        Self::Oid,
        Self::ObjectOid,
        Self::ClassOid,
        Self::String,
        Self::Enum,
        Self::Collection,
        Self::GenericCollection,
        Self::Array,
        Self::Map,
        Self::NonNative,
    ];

    /// Highest id of a fixed-size kind.
    pub const NATIVE_FIX_SIZE_MAX_ID: u32 = 182;
    /// Highest id of an atomic (non-container) native kind.
    pub const NATIVE_MAX_ID: u32 = 210;

    /// The fixed id of the built-in descriptor for this kind.
    pub const fn builtin_id(&self) -> TypeId {
        TypeId::new(match self {
            Self::Null => 0,
            Self::Boolean => 10,
            Self::Byte => 20,
            Self::SByte => 21,
            Self::Character => 30,
            Self::Short => 40,
            Self::UShort => 41,
            Self::Integer => 50,
            Self::UInteger => 51,
            Self::Long => 60,
            Self::ULong => 61,
            Self::Float => 70,
            Self::Double => 80,
            Self::Decimal => 100,
            Self::Date => 170,
            Self::Oid => 180,
            Self::ObjectOid => 181,
            Self::ClassOid => 182,
            Self::String => 210,
            Self::Enum => 211,
            Self::Collection => 250,
            Self::GenericCollection => 251,
            Self::Array => 260,
            Self::Map => 270,
            Self::NonNative => 300,
        })
    }

    /// Canonical name of the built-in descriptor.
    pub const fn builtin_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "bool",
            Self::Byte => "u8",
            Self::SByte => "i8",
            Self::Character => "char",
            Self::Short => "i16",
            Self::UShort => "u16",
            Self::Integer => "i32",
            Self::UInteger => "u32",
            Self::Long => "i64",
            Self::ULong => "u64",
            Self::Float => "f32",
            Self::Double => "f64",
            Self::Decimal => "i128",
            Self::Date => "std::time::SystemTime",
            Self::Oid => "objdb::AnyOid",
            Self::ObjectOid => "objdb::ObjectOid",
            Self::ClassOid => "objdb::ClassOid",
            Self::String => "String",
            Self::Enum => "enum",
            Self::Collection => "collection",
            Self::GenericCollection => "generic collection",
            Self::Array => "array",
            Self::Map => "map",
            Self::NonNative => "non native",
        }
    }

    /// Fixed-width and directly comparable as raw bytes.
    pub const fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::Null
                | Self::Boolean
                | Self::Byte
                | Self::SByte
                | Self::Character
                | Self::Short
                | Self::UShort
                | Self::Integer
                | Self::UInteger
                | Self::Long
                | Self::ULong
                | Self::Float
                | Self::Double
                | Self::Decimal
        )
    }

    /// Encoded size in bytes, `0` for variable-length kinds.
    pub const fn fixed_size(&self) -> usize {
        match self {
            Self::Null | Self::Boolean | Self::Byte | Self::SByte => 1,
            Self::Short | Self::UShort => 2,
            Self::Character | Self::Integer | Self::UInteger | Self::Float => 4,
            Self::Long | Self::ULong | Self::Double | Self::Date => 8,
            Self::ObjectOid | Self::ClassOid => 8,
            Self::Oid => 9,
            Self::Decimal => 16,
            Self::String
            | Self::Enum
            | Self::Collection
            | Self::GenericCollection
            | Self::Array
            | Self::Map
            | Self::NonNative => 0,
        }
    }

    pub const fn base_category(&self) -> NativeBaseCategory {
        match self {
            Self::Collection => NativeBaseCategory::Collection,
            Self::GenericCollection => NativeBaseCategory::GenericCollection,
            Self::Map => NativeBaseCategory::Map,
            _ => NativeBaseCategory::None,
        }
    }

    /// Look up the built-in kind owning a fixed id.
    pub fn from_builtin_id(id: TypeId) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.builtin_id() == id)
    }

    /// Whether values of this kind have a total order the index can use.
    ///
    /// Non-native kinds are decided per descriptor (see
    /// [`TypeDescriptor::is_orderable`](crate::TypeDescriptor::is_orderable)).
    pub const fn is_orderable(&self) -> bool {
        !matches!(
            self,
            Self::Null
                | Self::Collection
                | Self::GenericCollection
                | Self::Array
                | Self::Map
                | Self::NonNative
        )
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.builtin_name())
    }
}
