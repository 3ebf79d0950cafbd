use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use objdb_types::TypeId;

use crate::descriptor::TypeDescriptor;
use crate::error::{MetaError, MetaResult};
use crate::info::{Capability, Describe, TypeInfo, TypeShape};
use crate::kind::TypeKind;

/// Descriptors discovered at run time.
pub(crate) struct DynamicTypes {
    /// Every cached name, including map and collection aliases of built-ins.
    pub(crate) by_name: HashMap<String, Arc<TypeDescriptor>>,
    /// Descriptors owning a dynamic id.
    pub(crate) by_id: HashMap<TypeId, Arc<TypeDescriptor>>,
    pub(crate) next_id: TypeId,
}

impl DynamicTypes {
    fn new() -> Self {
        Self {
            by_name: HashMap::new(),
            by_id: HashMap::new(),
            next_id: TypeId::FIRST_DYNAMIC,
        }
    }

    /// Insert a descriptor that owns its id.
    pub(crate) fn register(&mut self, descriptor: TypeDescriptor) -> Arc<TypeDescriptor> {
        let descriptor = Arc::new(descriptor);
        if descriptor.id >= self.next_id {
            self.next_id = descriptor.id.next();
        }
        self.by_name
            .insert(descriptor.name.clone(), Arc::clone(&descriptor));
        self.by_id.insert(descriptor.id, Arc::clone(&descriptor));
        descriptor
    }
}

/// Resolves runtime type descriptions to canonical descriptors.
///
/// Built-in descriptors are created once in [`TypeRegistry::new`] and never
/// change. Everything else is created on first sight and cached by
/// canonical name for the life of the registry, so repeated resolutions of
/// one name return the same `Arc`. Safe to share between threads.
pub struct TypeRegistry {
    builtin_by_name: HashMap<&'static str, Arc<TypeDescriptor>>,
    builtin_by_id: HashMap<TypeId, Arc<TypeDescriptor>>,
    pub(crate) dynamic: RwLock<DynamicTypes>,
}

impl TypeRegistry {
    /// Create a registry holding only the built-in descriptors.
    pub fn new() -> Self {
        let mut builtin_by_name = HashMap::new();
        let mut builtin_by_id = HashMap::new();
        for kind in TypeKind::ALL {
            let descriptor = Arc::new(TypeDescriptor::builtin(kind));
            builtin_by_name.insert(kind.builtin_name(), Arc::clone(&descriptor));
            builtin_by_id.insert(kind.builtin_id(), descriptor);
        }
        Self {
            builtin_by_name,
            builtin_by_id,
            dynamic: RwLock::new(DynamicTypes::new()),
        }
    }

    /// The built-in descriptor of `kind`.
    pub fn builtin(&self, kind: TypeKind) -> Arc<TypeDescriptor> {
        // Every kind is inserted by `new`.
        Arc::clone(&self.builtin_by_id[&kind.builtin_id()])
    }

    /// Resolve a runtime type to its canonical descriptor.
    pub fn resolve(&self, info: &TypeInfo) -> Arc<TypeDescriptor> {
        if !info.is_enum() {
            if let Some(builtin) = self.builtin_by_name.get(info.name.as_str()) {
                return Arc::clone(builtin);
            }
        }
        if let Some(cached) = self.cached(&info.name) {
            return cached;
        }

        match &info.shape {
            TypeShape::Enum => self.intern(&info.name, TypeKind::Enum, None, &[], &[]),
            TypeShape::Array(element) => {
                // Resolved before taking the write lock; the element may be
                // new as well.
                let element = self.resolve(element);
                self.intern(&info.name, TypeKind::Array, Some(element), &[], &[])
            }
            TypeShape::Class { .. } if info.is_map_like() => self.alias(&info.name, TypeKind::Map),
            TypeShape::Class { .. } if info.is_collection_like() => {
                self.alias(&info.name, TypeKind::Collection)
            }
            TypeShape::Class {
                capabilities,
                supertypes,
            } => self.intern(
                &info.name,
                TypeKind::NonNative,
                None,
                capabilities,
                supertypes,
            ),
        }
    }

    /// Resolve the descriptor of a Rust type.
    pub fn resolve_type<T: Describe + ?Sized>(&self) -> Arc<TypeDescriptor> {
        self.resolve(&T::type_info())
    }

    /// Look up a descriptor by id.
    pub fn resolve_by_id(&self, id: TypeId) -> MetaResult<Arc<TypeDescriptor>> {
        if let Some(builtin) = self.builtin_by_id.get(&id) {
            return Ok(Arc::clone(builtin));
        }
        let dynamic = self.dynamic.read().expect("lock poisoned");
        dynamic
            .by_id
            .get(&id)
            .cloned()
            .ok_or(MetaError::UnknownTypeId(id))
    }

    /// Look up a descriptor by canonical name.
    ///
    /// Unknown names yield a transient non-native descriptor carrying the
    /// built-in non-native id. It is not cached.
    pub fn resolve_by_name(&self, name: &str) -> Arc<TypeDescriptor> {
        if let Some(builtin) = self.builtin_by_name.get(name) {
            return Arc::clone(builtin);
        }
        if let Some(cached) = self.cached(name) {
            return cached;
        }
        Arc::new(TypeDescriptor {
            name: name.to_string(),
            ..TypeDescriptor::builtin(TypeKind::NonNative)
        })
    }

    /// Whether `name` is a built-in or already cached.
    pub fn exists(&self, name: &str) -> bool {
        self.builtin_by_name.contains_key(name)
            || self
                .dynamic
                .read()
                .expect("lock poisoned")
                .by_name
                .contains_key(name)
    }

    /// Whether the engine stores `info` natively. Does not cache anything.
    pub fn is_native(&self, info: &TypeInfo) -> bool {
        info.is_enum()
            || info.is_array()
            || info.is_map_like()
            || info.is_collection_like()
            || self.builtin_by_name.contains_key(info.name.as_str())
    }

    /// Whether values of type `a` may be read as type `b`.
    pub fn types_compatible(&self, a: &TypeInfo, b: &TypeInfo) -> bool {
        self.resolve(a).is_compatible_with(&self.resolve(b))
    }

    /// Number of descriptors owning a dynamic id.
    pub fn dynamic_count(&self) -> usize {
        self.dynamic.read().expect("lock poisoned").by_id.len()
    }

    /// Descriptors owning a dynamic id, in id order.
    pub fn dynamic_descriptors(&self) -> Vec<Arc<TypeDescriptor>> {
        let dynamic = self.dynamic.read().expect("lock poisoned");
        let mut descriptors: Vec<_> = dynamic.by_id.values().cloned().collect();
        descriptors.sort_by_key(|d| d.id);
        descriptors
    }

    fn cached(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        self.dynamic
            .read()
            .expect("lock poisoned")
            .by_name
            .get(name)
            .cloned()
    }

    /// Cache `name` as another spelling of a built-in container.
    fn alias(&self, name: &str, kind: TypeKind) -> Arc<TypeDescriptor> {
        let builtin = self.builtin(kind);
        let mut dynamic = self.dynamic.write().expect("lock poisoned");
        Arc::clone(
            dynamic
                .by_name
                .entry(name.to_string())
                .or_insert(builtin),
        )
    }

    fn intern(
        &self,
        name: &str,
        kind: TypeKind,
        element: Option<Arc<TypeDescriptor>>,
        capabilities: &[Capability],
        supertypes: &[String],
    ) -> Arc<TypeDescriptor> {
        let mut dynamic = self.dynamic.write().expect("lock poisoned");
        // Another thread may have won the race since the read check.
        if let Some(existing) = dynamic.by_name.get(name) {
            return Arc::clone(existing);
        }
        let id = dynamic.next_id;
        let descriptor = dynamic.register(TypeDescriptor {
            id,
            name: name.to_string(),
            kind,
            element,
            capabilities: capabilities.to_vec(),
            supertypes: supertypes.to_vec(),
        });
        debug!(id = id.get(), type_name = name, %kind, "registered type");
        descriptor
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("builtin_count", &self.builtin_by_id.len())
            .field("dynamic_count", &self.dynamic_count())
            .finish()
    }
}
