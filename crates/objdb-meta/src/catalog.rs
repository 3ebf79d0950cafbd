//! Persisted type catalog.
//!
//! Only descriptors owning a dynamic id are written; built-ins are rebuilt by
//! [`TypeRegistry::new`] and map/collection aliases are re-cached on their
//! next resolution.
//!
//! Channel format:
//! ```text
//! [4 bytes: magic "ODBC"]
//! [4 bytes: format version (big-endian u32)]
//! [4 bytes: entry count (big-endian u32)]
//! [frame]*   one bincode-encoded CatalogEntry per frame, in id order
//! ```

use serde::{Deserialize, Serialize};
use tracing::info;

use objdb_io::{push_frame, read_frame_at, StorageChannel, FRAME_HEADER_SIZE};
use objdb_types::TypeId;

use crate::descriptor::TypeDescriptor;
use crate::error::{MetaError, MetaResult};
use crate::info::Capability;
use crate::kind::TypeKind;
use crate::registry::TypeRegistry;

const MAGIC: &[u8; 4] = b"ODBC";
const VERSION: u32 = 1;
const HEADER_SIZE: u64 = 12;

/// Serialized form of one dynamic descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: TypeId,
    pub name: String,
    pub kind: TypeKind,
    /// Element type id of an array.
    pub element: Option<TypeId>,
    pub capabilities: Vec<Capability>,
    pub supertypes: Vec<String>,
}

impl From<&TypeDescriptor> for CatalogEntry {
    fn from(descriptor: &TypeDescriptor) -> Self {
        Self {
            id: descriptor.id,
            name: descriptor.name.clone(),
            kind: descriptor.kind,
            element: descriptor.element.as_ref().map(|e| e.id),
            capabilities: descriptor.capabilities.clone(),
            supertypes: descriptor.supertypes.clone(),
        }
    }
}

impl TypeRegistry {
    /// Entries for every dynamic descriptor, in id order.
    pub fn export_catalog(&self) -> Vec<CatalogEntry> {
        self.dynamic_descriptors()
            .iter()
            .map(|d| CatalogEntry::from(d.as_ref()))
            .collect()
    }

    /// Build a registry from catalog entries.
    ///
    /// Entries may arrive in any order; an array's element must be a
    /// built-in or an entry with a lower id.
    pub fn from_catalog(entries: impl IntoIterator<Item = CatalogEntry>) -> MetaResult<Self> {
        let registry = Self::new();
        let mut entries: Vec<CatalogEntry> = entries.into_iter().collect();
        entries.sort_by_key(|e| e.id);

        for entry in entries {
            if !entry.id.is_dynamic() {
                return Err(MetaError::CorruptCatalog(format!(
                    "type {:?} has reserved id {}",
                    entry.name, entry.id
                )));
            }
            if !matches!(entry.kind, TypeKind::Array | TypeKind::Enum | TypeKind::NonNative) {
                return Err(MetaError::CorruptCatalog(format!(
                    "type {:?} has non-dynamic kind {}",
                    entry.name, entry.kind
                )));
            }
            if registry.exists(&entry.name) || registry.resolve_by_id(entry.id).is_ok() {
                return Err(MetaError::CatalogConflict {
                    id: entry.id,
                    name: entry.name,
                });
            }

            let element = match (entry.kind, entry.element) {
                (TypeKind::Array, Some(element_id)) => {
                    Some(registry.resolve_by_id(element_id).map_err(|_| {
                        MetaError::CorruptCatalog(format!(
                            "array {:?} refers to unknown element type {}",
                            entry.name, element_id
                        ))
                    })?)
                }
                (TypeKind::Array, None) => {
                    return Err(MetaError::CorruptCatalog(format!(
                        "array {:?} has no element type",
                        entry.name
                    )));
                }
                (_, _) => None,
            };

            registry
                .dynamic
                .write()
                .expect("lock poisoned")
                .register(TypeDescriptor {
                    id: entry.id,
                    name: entry.name,
                    kind: entry.kind,
                    element,
                    capabilities: entry.capabilities,
                    supertypes: entry.supertypes,
                });
        }
        Ok(registry)
    }

    /// Replace the catalog stored in `channel` with this registry's.
    pub fn write_catalog<C: StorageChannel + ?Sized>(&self, channel: &mut C) -> MetaResult<()> {
        let entries = self.export_catalog();
        let count = u32::try_from(entries.len())
            .map_err(|_| MetaError::CorruptCatalog("too many catalog entries".into()))?;

        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&VERSION.to_be_bytes());
        buf.extend_from_slice(&count.to_be_bytes());
        for entry in &entries {
            let payload =
                bincode::serialize(entry).map_err(|e| MetaError::Serialization(e.to_string()))?;
            push_frame(&mut buf, &payload)?;
        }

        channel.set_position(0)?;
        channel.write_bytes(&buf)?;
        channel.flush()?;

        info!(entries = count, bytes = buf.len(), "type catalog written");
        Ok(())
    }

    /// Load a registry from a catalog channel. An empty channel yields a
    /// registry holding only built-ins.
    pub fn load<C: StorageChannel + ?Sized>(channel: &mut C) -> MetaResult<Self> {
        if channel.is_empty()? {
            return Ok(Self::new());
        }

        let magic = channel.read_at(0, 4)?;
        if magic != MAGIC {
            return Err(MetaError::CorruptCatalog(format!("bad magic {magic:?}")));
        }
        let version = channel.read_u32_at(4)?;
        if version != VERSION {
            return Err(MetaError::CorruptCatalog(format!(
                "unsupported catalog version {version}"
            )));
        }
        let count = channel.read_u32_at(8)?;
        let available = channel.len()?.saturating_sub(HEADER_SIZE);
        if u64::from(count) * FRAME_HEADER_SIZE > available {
            return Err(MetaError::CorruptCatalog(format!(
                "{count} entries cannot fit in {available} bytes"
            )));
        }

        let mut entries = Vec::with_capacity(count as usize);
        let mut position = HEADER_SIZE;
        for _ in 0..count {
            let payload = read_frame_at(channel, position)?;
            position += FRAME_HEADER_SIZE + payload.len() as u64;
            let entry: CatalogEntry = bincode::deserialize(&payload)
                .map_err(|e| MetaError::Serialization(e.to_string()))?;
            entries.push(entry);
        }

        let registry = Self::from_catalog(entries)?;
        info!(entries = count, "type catalog loaded");
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::{Describe, TypeInfo};
    use objdb_io::{ChannelConfig, FileChannel, IoError, MemoryChannel};
    use std::sync::Arc;

    fn populated() -> TypeRegistry {
        let reg = TypeRegistry::new();
        reg.resolve_type::<[[i64; 2]; 2]>();
        reg.resolve(&TypeInfo::enumeration("app::Color"));
        reg.resolve(
            &TypeInfo::named("app::Person")
                .with_supertype("app::Entity")
                .with_capability(Capability::Comparable),
        );
        reg.resolve_type::<Vec<String>>();
        reg
    }

    #[test]
    fn ids_roundtrip_through_channel() {
        let reg = populated();
        let mut ch = MemoryChannel::new();
        reg.write_catalog(&mut ch).unwrap();

        let loaded = TypeRegistry::load(&mut ch).unwrap();
        assert_eq!(loaded.export_catalog(), reg.export_catalog());

        for original in reg.dynamic_descriptors() {
            let restored = loaded.resolve_by_id(original.id()).unwrap();
            assert_eq!(restored.name(), original.name());
            assert_eq!(restored.kind(), original.kind());
            assert_eq!(restored.is_orderable(), original.is_orderable());
        }
    }

    #[test]
    fn loaded_registry_reuses_cached_descriptors() {
        let reg = populated();
        let mut ch = MemoryChannel::new();
        reg.write_catalog(&mut ch).unwrap();
        let loaded = TypeRegistry::load(&mut ch).unwrap();

        let before = reg.resolve_type::<[[i64; 2]; 2]>();
        let after = loaded.resolve_type::<[[i64; 2]; 2]>();
        assert_eq!(before.id(), after.id());
        assert!(Arc::ptr_eq(after.element().unwrap(), &loaded.resolve_type::<[i64; 1]>()));
    }

    #[test]
    fn new_ids_continue_after_loaded_ones() {
        let reg = populated();
        let highest = reg.dynamic_descriptors().last().unwrap().id();
        let mut ch = MemoryChannel::new();
        reg.write_catalog(&mut ch).unwrap();

        let loaded = TypeRegistry::load(&mut ch).unwrap();
        let fresh = loaded.resolve(&TypeInfo::named("app::Fresh"));
        assert_eq!(fresh.id(), highest.next());
    }

    #[test]
    fn empty_channel_loads_builtins_only() {
        let mut ch = MemoryChannel::new();
        let reg = TypeRegistry::load(&mut ch).unwrap();
        assert_eq!(reg.dynamic_count(), 0);
        assert_eq!(reg.resolve_type::<bool>().kind(), TypeKind::Boolean);
    }

    #[test]
    fn rewrite_replaces_previous_catalog() {
        let mut ch = MemoryChannel::new();
        populated().write_catalog(&mut ch).unwrap();

        let smaller = TypeRegistry::new();
        smaller.resolve(&TypeInfo::named("app::Only"));
        smaller.write_catalog(&mut ch).unwrap();

        let loaded = TypeRegistry::load(&mut ch).unwrap();
        assert_eq!(loaded.dynamic_count(), 1);
        assert!(loaded.exists("app::Only"));
    }

    #[test]
    fn bad_magic_rejected() {
        let mut ch = MemoryChannel::from_bytes(b"NOPE\0\0\0\x01\0\0\0\0".to_vec());
        assert!(matches!(
            TypeRegistry::load(&mut ch),
            Err(MetaError::CorruptCatalog(_))
        ));
    }

    #[test]
    fn oversized_entry_count_rejected() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&VERSION.to_be_bytes());
        bytes.extend_from_slice(&u32::MAX.to_be_bytes());
        let mut ch = MemoryChannel::from_bytes(bytes);
        assert!(matches!(
            TypeRegistry::load(&mut ch),
            Err(MetaError::CorruptCatalog(_))
        ));
    }

    #[test]
    fn corrupted_entry_detected() {
        let reg = populated();
        let mut ch = MemoryChannel::new();
        reg.write_catalog(&mut ch).unwrap();
        let last = ch.as_bytes().len() - 1;
        ch.bytes_mut()[last] ^= 0xFF;

        let err = TypeRegistry::load(&mut ch).unwrap_err();
        assert!(matches!(err, MetaError::Io(IoError::CorruptFrame { .. })));
    }

    #[test]
    fn dangling_element_rejected() {
        let entry = CatalogEntry {
            id: TypeId::new(1000),
            name: "[app::Gone]".into(),
            kind: TypeKind::Array,
            element: Some(TypeId::new(1500)),
            capabilities: Vec::new(),
            supertypes: Vec::new(),
        };
        assert!(matches!(
            TypeRegistry::from_catalog([entry]),
            Err(MetaError::CorruptCatalog(_))
        ));
    }

    #[test]
    fn duplicate_name_conflicts() {
        let entry = |id| CatalogEntry {
            id: TypeId::new(id),
            name: "app::Twice".into(),
            kind: TypeKind::NonNative,
            element: None,
            capabilities: Vec::new(),
            supertypes: Vec::new(),
        };
        assert!(matches!(
            TypeRegistry::from_catalog([entry(1000), entry(1001)]),
            Err(MetaError::CatalogConflict { .. })
        ));
    }

    #[test]
    fn reserved_id_rejected() {
        let entry = CatalogEntry {
            id: TypeId::new(50),
            name: "app::Sneaky".into(),
            kind: TypeKind::NonNative,
            element: None,
            capabilities: Vec::new(),
            supertypes: Vec::new(),
        };
        assert!(TypeRegistry::from_catalog([entry]).is_err());
    }

    #[test]
    fn file_backed_catalog_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("types.odbc");

        let id = {
            let reg = TypeRegistry::new();
            let id = reg.resolve(&TypeInfo::named("app::Invoice")).id();
            let mut ch = FileChannel::create(&path, &ChannelConfig::default()).unwrap();
            reg.write_catalog(&mut ch).unwrap();
            id
        };

        let mut ch = FileChannel::open(&path, &ChannelConfig::default()).unwrap();
        let reg = TypeRegistry::load(&mut ch).unwrap();
        assert_eq!(reg.resolve_by_id(id).unwrap().name(), "app::Invoice");
        assert_eq!(String::type_info().name, reg.resolve_type::<String>().name());
    }
}
