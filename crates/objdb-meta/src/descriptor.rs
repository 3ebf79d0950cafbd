use std::fmt;
use std::sync::Arc;

use objdb_types::TypeId;

use crate::info::Capability;
use crate::kind::{NativeBaseCategory, TypeKind};

/// Canonical, immutable description of how a type is represented.
///
/// Descriptors are only created by a [`TypeRegistry`](crate::TypeRegistry)
/// and handed out behind an `Arc`; two resolutions of the same canonical
/// name yield the same allocation.
#[derive(Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub(crate) id: TypeId,
    pub(crate) name: String,
    pub(crate) kind: TypeKind,
    pub(crate) element: Option<Arc<TypeDescriptor>>,
    pub(crate) capabilities: Vec<Capability>,
    pub(crate) supertypes: Vec<String>,
}

impl TypeDescriptor {
    pub(crate) fn builtin(kind: TypeKind) -> Self {
        Self {
            id: kind.builtin_id(),
            name: kind.builtin_name().to_string(),
            kind,
            element: None,
            capabilities: Vec::new(),
            supertypes: Vec::new(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Canonical name; unique among descriptors of one registry.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Element descriptor of an array type.
    pub fn element(&self) -> Option<&Arc<TypeDescriptor>> {
        self.element.as_ref()
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn supertypes(&self) -> &[String] {
        &self.supertypes
    }

    pub fn is_primitive(&self) -> bool {
        self.kind.is_primitive()
    }

    /// Encoded size in bytes, `0` if variable-length.
    pub fn fixed_size(&self) -> usize {
        self.kind.fixed_size()
    }

    pub fn base_category(&self) -> NativeBaseCategory {
        self.kind.base_category()
    }

    /// Either collection kind.
    pub fn is_collection(&self) -> bool {
        matches!(self.kind, TypeKind::Collection | TypeKind::GenericCollection)
    }

    pub fn is_array(&self) -> bool {
        self.kind == TypeKind::Array
    }

    pub fn is_map(&self) -> bool {
        self.kind == TypeKind::Map
    }

    pub fn is_array_or_collection(&self) -> bool {
        self.is_array() || self.is_collection()
    }

    pub fn is_native(&self) -> bool {
        self.kind != TypeKind::NonNative
    }

    pub fn is_non_native(&self) -> bool {
        self.kind == TypeKind::NonNative
    }

    pub fn is_null(&self) -> bool {
        self.kind == TypeKind::Null
    }

    pub fn has_fixed_size(&self) -> bool {
        let id = self.id.get();
        id > 0 && id <= TypeKind::NATIVE_FIX_SIZE_MAX_ID
    }

    pub fn is_string_or_decimal(&self) -> bool {
        matches!(self.kind, TypeKind::String | TypeKind::Decimal)
    }

    /// Built-in scalar, identifier or string.
    pub fn is_atomic_native(&self) -> bool {
        let id = self.id.get();
        id > 0 && id <= TypeKind::NATIVE_MAX_ID
    }

    pub fn is_enum(&self) -> bool {
        self.kind == TypeKind::Enum
    }

    pub fn is_boolean(&self) -> bool {
        self.kind == TypeKind::Boolean
    }

    pub fn is_date(&self) -> bool {
        self.kind == TypeKind::Date
    }

    /// Whether values of this type may be used as index keys.
    pub fn is_orderable(&self) -> bool {
        match self.kind {
            TypeKind::NonNative => self.capabilities.contains(&Capability::Comparable),
            kind => kind.is_orderable(),
        }
    }

    /// Whether a value stored as `self` can be read back as `other`.
    ///
    /// Arrays are compared through their elements. Natives are compatible
    /// only with the same name, except that `i32` matches `i32`. Application
    /// types are compatible when one names the other as a supertype.
    pub fn is_compatible_with(&self, other: &TypeDescriptor) -> bool {
        if let (Some(a), Some(b)) = (&self.element, &other.element) {
            return a.is_compatible_with(b);
        }
        if self.name == other.name {
            return true;
        }
        if self.is_array() || other.is_array() {
            return false;
        }
        match (self.is_non_native(), other.is_non_native()) {
            (false, false) => self.kind == TypeKind::Integer && other.kind == TypeKind::Integer,
            (true, true) => {
                self.supertypes.iter().any(|s| *s == other.name)
                    || other.supertypes.iter().any(|s| *s == self.name)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("element", &self.element.as_ref().map(|e| e.name.as_str()))
            .finish()
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{})", self.name, self.id)
    }
}
