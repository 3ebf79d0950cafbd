//! Runtime type descriptions.
//!
//! [`TypeInfo`] is what a caller hands to the registry: a canonical name and
//! a structural shape. The registry never inspects Rust types directly; the
//! [`Describe`] trait produces a `TypeInfo` for the standard library types
//! the engine stores natively, and application types implement it
//! themselves.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, LinkedList, VecDeque};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use objdb_types::{AnyOid, ClassOid, ObjectOid};

use crate::kind::TypeKind;

/// A structural capability a class type declares.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    /// Untyped key/value dictionary.
    Map,
    /// Typed key/value dictionary.
    GenericMap,
    /// Untyped collection.
    Collection,
    /// Typed collection.
    GenericCollection,
    /// Values have a total order and may be used as index keys.
    Comparable,
}

/// Structural shape of a runtime type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeShape {
    /// An enumeration, stored by variant name.
    Enum,
    /// A fixed or boxed array of the element type.
    Array(Box<TypeInfo>),
    /// Any other named type.
    Class {
        capabilities: Vec<Capability>,
        /// Names of supertypes and implemented interfaces.
        supertypes: Vec<String>,
    },
}

/// Description of a runtime type: canonical name plus shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub name: String,
    pub shape: TypeShape,
}

impl TypeInfo {
    /// A plain named type with no declared capabilities.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shape: TypeShape::Class {
                capabilities: Vec::new(),
                supertypes: Vec::new(),
            },
        }
    }

    /// The description of a built-in kind.
    pub fn builtin(kind: TypeKind) -> Self {
        Self::named(kind.builtin_name())
    }

    /// An enumeration type.
    pub fn enumeration(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shape: TypeShape::Enum,
        }
    }

    /// An array of `element`. Arrays are named `[element]` regardless of
    /// length, so `[T; 3]` and `Box<[T]>` share a descriptor.
    pub fn array_of(element: TypeInfo) -> Self {
        Self {
            name: format!("[{}]", element.name),
            shape: TypeShape::Array(Box::new(element)),
        }
    }

    /// Add a capability. No effect on enums and arrays.
    pub fn with_capability(mut self, capability: Capability) -> Self {
        if let TypeShape::Class { capabilities, .. } = &mut self.shape {
            if !capabilities.contains(&capability) {
                capabilities.push(capability);
            }
        }
        self
    }

    /// Add a supertype name. No effect on enums and arrays.
    pub fn with_supertype(mut self, supertype: impl Into<String>) -> Self {
        if let TypeShape::Class { supertypes, .. } = &mut self.shape {
            supertypes.push(supertype.into());
        }
        self
    }

    pub fn is_array(&self) -> bool {
        matches!(self.shape, TypeShape::Array(_))
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.shape, TypeShape::Enum)
    }

    pub fn capabilities(&self) -> &[Capability] {
        match &self.shape {
            TypeShape::Class { capabilities, .. } => capabilities,
            _ => &[],
        }
    }

    pub fn supertypes(&self) -> &[String] {
        match &self.shape {
            TypeShape::Class { supertypes, .. } => supertypes,
            _ => &[],
        }
    }

    /// Declares a map capability.
    pub fn is_map_like(&self) -> bool {
        self.capabilities()
            .iter()
            .any(|c| matches!(c, Capability::Map | Capability::GenericMap))
    }

    /// Declares a collection capability.
    pub fn is_collection_like(&self) -> bool {
        self.capabilities()
            .iter()
            .any(|c| matches!(c, Capability::Collection | Capability::GenericCollection))
    }
}

/// Types that can describe themselves to the registry.
pub trait Describe {
    fn type_info() -> TypeInfo;
}

macro_rules! describe_builtin {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Describe for $ty {
                fn type_info() -> TypeInfo {
                    TypeInfo::builtin(TypeKind::$kind)
                }
            }
        )*
    };
}

describe_builtin! {
    bool => Boolean,
    u8 => Byte,
    i8 => SByte,
    char => Character,
    i16 => Short,
    u16 => UShort,
    i32 => Integer,
    u32 => UInteger,
    i64 => Long,
    u64 => ULong,
    f32 => Float,
    f64 => Double,
    i128 => Decimal,
    SystemTime => Date,
    AnyOid => Oid,
    ObjectOid => ObjectOid,
    ClassOid => ClassOid,
    String => String,
    str => String,
}

impl<T: Describe + ?Sized> Describe for &T {
    fn type_info() -> TypeInfo {
        T::type_info()
    }
}

impl<T: Describe> Describe for Option<T> {
    fn type_info() -> TypeInfo {
        T::type_info()
    }
}

impl<T: Describe, const N: usize> Describe for [T; N] {
    fn type_info() -> TypeInfo {
        TypeInfo::array_of(T::type_info())
    }
}

impl<T: Describe> Describe for Box<[T]> {
    fn type_info() -> TypeInfo {
        TypeInfo::array_of(T::type_info())
    }
}

macro_rules! describe_collection {
    ($($outer:ident),* $(,)?) => {
        $(
            impl<T: Describe> Describe for $outer<T> {
                fn type_info() -> TypeInfo {
                    TypeInfo::named(format!("{}<{}>", stringify!($outer), T::type_info().name))
                        .with_capability(Capability::GenericCollection)
                }
            }
        )*
    };
}

describe_collection!(Vec, VecDeque, LinkedList, HashSet, BTreeSet);

macro_rules! describe_map {
    ($($outer:ident),* $(,)?) => {
        $(
            impl<K: Describe, V: Describe> Describe for $outer<K, V> {
                fn type_info() -> TypeInfo {
                    TypeInfo::named(format!(
                        "{}<{}, {}>",
                        stringify!($outer),
                        K::type_info().name,
                        V::type_info().name
                    ))
                    .with_capability(Capability::GenericMap)
                }
            }
        )*
    };
}

describe_map!(HashMap, BTreeMap);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_use_builtin_names() {
        assert_eq!(i32::type_info().name, "i32");
        assert_eq!(String::type_info().name, "String");
        assert_eq!(<&str>::type_info().name, "String");
        assert_eq!(SystemTime::type_info().name, "std::time::SystemTime");
    }

    #[test]
    fn option_is_transparent() {
        assert_eq!(Option::<i64>::type_info(), i64::type_info());
    }

    #[test]
    fn arrays_ignore_length() {
        assert_eq!(<[i32; 3]>::type_info(), <Box<[i32]>>::type_info());
        assert_eq!(<[i32; 3]>::type_info().name, "[i32]");
    }

    #[test]
    fn nested_array_names() {
        assert_eq!(<[[u8; 2]; 4]>::type_info().name, "[[u8]]");
    }

    #[test]
    fn collections_declare_generic_capability() {
        let info = Vec::<String>::type_info();
        assert_eq!(info.name, "Vec<String>");
        assert!(info.is_collection_like());
        assert!(!info.is_map_like());
    }

    #[test]
    fn maps_declare_generic_map() {
        let info = HashMap::<String, i32>::type_info();
        assert_eq!(info.name, "HashMap<String, i32>");
        assert!(info.is_map_like());
    }

    #[test]
    fn builder_ignores_capabilities_on_arrays() {
        let info = TypeInfo::array_of(i32::type_info()).with_capability(Capability::Map);
        assert!(info.capabilities().is_empty());
    }

    #[test]
    fn capabilities_are_not_duplicated() {
        let info = TypeInfo::named("app::Thing")
            .with_capability(Capability::Comparable)
            .with_capability(Capability::Comparable);
        assert_eq!(info.capabilities(), &[Capability::Comparable]);
    }
}
