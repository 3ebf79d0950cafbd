use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, RwLock};

use tracing::{debug, info};

use objdb_io::{frame, FileChannel, MemoryChannel, StorageChannel};
use objdb_meta::{TypeDescriptor, TypeRegistry};
use objdb_oid::{IdentityManager, IdentityTable, InMemoryIdentityTable, PersistentIdentityTable};
use objdb_types::{ClassOid, ObjectOid, Position, TypeId};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::record::{ClassRecord, ObjectRecord, StoredRecord};
use crate::traits::ObjectStore;

/// Store held entirely in memory. Intended for tests and embedding.
pub type InMemoryObjectStore =
    RecordStore<InMemoryIdentityTable<ObjectOid>, InMemoryIdentityTable<ClassOid>, MemoryChannel>;

/// Store kept in a directory of files laid out by [`StoreConfig`].
pub type FileObjectStore = RecordStore<
    PersistentIdentityTable<ObjectOid, FileChannel>,
    PersistentIdentityTable<ClassOid, FileChannel>,
    FileChannel,
>;

/// Record store over a pair of identity tables and a record channel.
///
/// Records are appended as frames to the channel; identity tables map each
/// identifier to the position of its current frame. A class name index is
/// rebuilt from the class records on open.
pub struct RecordStore<OT, CT, C> {
    ids: IdentityManager<OT, CT>,
    records: Mutex<C>,
    classes: RwLock<HashMap<String, ClassOid>>,
}

impl InMemoryObjectStore {
    pub fn in_memory() -> Self {
        Self {
            ids: IdentityManager::in_memory(),
            records: Mutex::new(MemoryChannel::new()),
            classes: RwLock::new(HashMap::new()),
        }
    }
}

impl FileObjectStore {
    /// Open the store in `dir`, creating its files if missing.
    pub fn open(dir: &Path, config: &StoreConfig) -> StoreResult<Self> {
        fs::create_dir_all(dir)?;
        let ids = IdentityManager::open(
            FileChannel::open(&config.object_ids_path(dir), &config.channel)?,
            FileChannel::open(&config.class_ids_path(dir), &config.channel)?,
        )?;
        let records = FileChannel::open(&config.records_path(dir), &config.channel)?;
        let store = Self::new(ids, records)?;
        let objects = store.ids.objects().live_count()?;
        let classes = store.classes.read().expect("lock poisoned").len();
        info!(dir = %dir.display(), objects, classes, "opened store");
        Ok(store)
    }

    /// Force records and both identity tables to stable storage.
    pub fn flush(&self) -> StoreResult<()> {
        self.records.lock().expect("lock poisoned").flush()?;
        self.ids.flush()?;
        Ok(())
    }
}

impl<OT, CT, C> RecordStore<OT, CT, C>
where
    OT: IdentityTable<ObjectOid>,
    CT: IdentityTable<ClassOid>,
    C: StorageChannel,
{
    /// Assemble a store from existing parts, indexing the registered classes.
    pub fn new(ids: IdentityManager<OT, CT>, records: C) -> StoreResult<Self> {
        let store = Self {
            ids,
            records: Mutex::new(records),
            classes: RwLock::new(HashMap::new()),
        };

        let mut index = HashMap::new();
        for oid in store.ids.classes().live_ids()? {
            let record = store.read_class(oid)?;
            index.insert(record.name, oid);
        }
        *store.classes.write().expect("lock poisoned") = index;
        Ok(store)
    }

    pub fn identities(&self) -> &IdentityManager<OT, CT> {
        &self.ids
    }

    fn append(&self, record: &StoredRecord) -> StoreResult<Position> {
        let payload = record.encode()?;
        let mut records = self.records.lock().expect("lock poisoned");
        let offset = frame::write_frame(&mut *records, &payload)?;
        Ok(Position::new(offset))
    }

    fn load(&self, position: Position) -> StoreResult<StoredRecord> {
        let mut records = self.records.lock().expect("lock poisoned");
        let payload = frame::read_frame_at(&mut *records, position.offset())?;
        StoredRecord::decode(&payload, position)
    }
}

impl<OT, CT, C> ObjectStore for RecordStore<OT, CT, C>
where
    OT: IdentityTable<ObjectOid>,
    CT: IdentityTable<ClassOid>,
    C: StorageChannel,
{
    fn register_class(&self, descriptor: &TypeDescriptor) -> StoreResult<ClassOid> {
        let mut classes = self.classes.write().expect("lock poisoned");
        if let Some(oid) = classes.get(descriptor.name()) {
            return Ok(*oid);
        }

        let record = ClassRecord {
            name: descriptor.name().to_string(),
            type_id: descriptor.id(),
        };
        let position = self.append(&StoredRecord::Class(record))?;
        let oid = self.ids.classes().allocate()?;
        self.ids.classes().bind(oid, position)?;
        classes.insert(descriptor.name().to_string(), oid);

        info!(%oid, class = descriptor.name(), type_id = %descriptor.id(), "registered class");
        Ok(oid)
    }

    fn class_oid(&self, name: &str) -> Option<ClassOid> {
        self.classes
            .read()
            .expect("lock poisoned")
            .get(name)
            .copied()
    }

    fn read_class(&self, oid: ClassOid) -> StoreResult<ClassRecord> {
        let position = self.ids.classes().resolve(oid)?;
        match self.load(position)? {
            StoredRecord::Class(record) => Ok(record),
            StoredRecord::Object(_) => Err(StoreError::NotAClass { oid, position }),
        }
    }

    fn store(&self, class: ClassOid, type_id: TypeId, data: &[u8]) -> StoreResult<ObjectOid> {
        if !self.ids.classes().is_live(class)? {
            return Err(StoreError::UnknownClass(class));
        }

        let record = ObjectRecord {
            class,
            type_id,
            data: data.to_vec(),
        };
        let position = self.append(&StoredRecord::Object(record))?;
        let oid = self.ids.objects().allocate()?;
        self.ids.objects().bind(oid, position)?;

        debug!(%oid, %class, %position, bytes = data.len(), "stored object");
        Ok(oid)
    }

    fn read(&self, oid: ObjectOid) -> StoreResult<ObjectRecord> {
        let position = self.ids.objects().resolve(oid)?;
        match self.load(position)? {
            StoredRecord::Object(record) => Ok(record),
            StoredRecord::Class(_) => Err(StoreError::NotAnObject { oid, position }),
        }
    }

    fn update(&self, oid: ObjectOid, data: &[u8]) -> StoreResult<()> {
        let mut record = self.read(oid)?;
        record.data = data.to_vec();
        let position = self.append(&StoredRecord::Object(record))?;
        self.ids.objects().bind(oid, position)?;

        debug!(%oid, %position, bytes = data.len(), "updated object");
        Ok(())
    }

    fn delete(&self, oid: ObjectOid) -> StoreResult<()> {
        self.ids.objects().invalidate(oid)?;
        debug!(%oid, "deleted object");
        Ok(())
    }

    fn all_object_ids(&self) -> StoreResult<Vec<ObjectOid>> {
        Ok(self.ids.objects().live_ids()?)
    }

    fn all_class_ids(&self) -> StoreResult<Vec<ClassOid>> {
        Ok(self.ids.classes().live_ids()?)
    }

    fn exists(&self, oid: ObjectOid) -> StoreResult<bool> {
        Ok(self.ids.objects().is_live(oid)?)
    }
}

impl<OT, CT, C> std::fmt::Debug for RecordStore<OT, CT, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field(
                "class_count",
                &self.classes.read().expect("lock poisoned").len(),
            )
            .finish()
    }
}

/// Load the type registry persisted in `dir`, or a fresh one if the store
/// has no catalog yet.
pub fn load_registry(dir: &Path, config: &StoreConfig) -> StoreResult<TypeRegistry> {
    let path = config.catalog_path(dir);
    if !path.exists() {
        return Ok(TypeRegistry::new());
    }
    let mut channel = FileChannel::open(&path, &config.channel)?;
    Ok(TypeRegistry::load(&mut channel)?)
}

/// Persist the dynamic part of `registry` into `dir`.
pub fn save_registry(dir: &Path, config: &StoreConfig, registry: &TypeRegistry) -> StoreResult<()> {
    let mut channel = FileChannel::create(&config.catalog_path(dir), &config.channel)?;
    registry.write_catalog(&mut channel)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use objdb_meta::{Capability, TypeInfo};
    use objdb_oid::OidError;

    fn person(registry: &TypeRegistry) -> std::sync::Arc<TypeDescriptor> {
        registry.resolve(&TypeInfo::named("app::Person").with_capability(Capability::Comparable))
    }

    #[test]
    fn store_and_read() {
        let registry = TypeRegistry::new();
        let store = InMemoryObjectStore::in_memory();
        let descriptor = person(&registry);
        let class = store.register_class(&descriptor).unwrap();

        let oid = store.store(class, descriptor.id(), b"alice").unwrap();
        let record = store.read(oid).unwrap();
        assert_eq!(record.class, class);
        assert_eq!(record.type_id, descriptor.id());
        assert_eq!(record.data, b"alice");
        assert!(store.exists(oid).unwrap());
    }

    #[test]
    fn register_class_is_idempotent() {
        let registry = TypeRegistry::new();
        let store = InMemoryObjectStore::in_memory();
        let a = store.register_class(&person(&registry)).unwrap();
        let b = store.register_class(&person(&registry)).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.class_oid("app::Person"), Some(a));
        assert_eq!(store.all_class_ids().unwrap(), vec![a]);

        let record = store.read_class(a).unwrap();
        assert_eq!(record.name, "app::Person");
    }

    #[test]
    fn store_under_unknown_class_fails() {
        let store = InMemoryObjectStore::in_memory();
        let result = store.store(ClassOid::new(9), TypeId::new(1000), b"x");
        assert!(matches!(result, Err(StoreError::UnknownClass(c)) if c == ClassOid::new(9)));
        assert_eq!(store.object_count().unwrap(), 0);
    }

    #[test]
    fn update_rebinds() {
        let registry = TypeRegistry::new();
        let store = InMemoryObjectStore::in_memory();
        let descriptor = person(&registry);
        let class = store.register_class(&descriptor).unwrap();
        let oid = store.store(class, descriptor.id(), b"v1").unwrap();
        let before = store.identities().objects().resolve(oid).unwrap();

        store.update(oid, b"v2").unwrap();
        let after = store.identities().objects().resolve(oid).unwrap();
        assert_ne!(before, after);
        assert_eq!(store.read(oid).unwrap().data, b"v2");
        assert_eq!(store.read(oid).unwrap().class, class);
    }

    #[test]
    fn delete_invalidates() {
        let registry = TypeRegistry::new();
        let store = InMemoryObjectStore::in_memory();
        let descriptor = person(&registry);
        let class = store.register_class(&descriptor).unwrap();
        let a = store.store(class, descriptor.id(), b"a").unwrap();
        let b = store.store(class, descriptor.id(), b"b").unwrap();

        store.delete(a).unwrap();
        assert!(matches!(
            store.read(a),
            Err(StoreError::Oid(OidError::DeletedOid { .. }))
        ));
        assert!(matches!(
            store.update(a, b"again"),
            Err(StoreError::Oid(OidError::DeletedOid { .. }))
        ));
        assert!(matches!(
            store.delete(a),
            Err(StoreError::Oid(OidError::DeletedOid { .. }))
        ));
        assert_eq!(store.all_object_ids().unwrap(), vec![b]);

        let c = store.store(class, descriptor.id(), b"c").unwrap();
        assert!(c > b);
    }

    #[test]
    fn class_oid_is_not_an_object() {
        let registry = TypeRegistry::new();
        let store = InMemoryObjectStore::in_memory();
        let descriptor = person(&registry);
        let class = store.register_class(&descriptor).unwrap();
        store.store(class, descriptor.id(), b"a").unwrap();

        // Both records live on the same channel; point an object id at the
        // class record.
        let class_position = store.identities().classes().resolve(class).unwrap();
        let oid = store.identities().objects().allocate().unwrap();
        store.identities().objects().bind(oid, class_position).unwrap();
        assert!(matches!(store.read(oid), Err(StoreError::NotAnObject { .. })));
    }

    #[test]
    fn reopen_lists_stored_objects() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::default();
        let registry = TypeRegistry::new();
        let descriptor = person(&registry);

        let (a, b) = {
            let store = FileObjectStore::open(dir.path(), &config).unwrap();
            let class = store.register_class(&descriptor).unwrap();
            let a = store.store(class, descriptor.id(), b"first").unwrap();
            let b = store.store(class, descriptor.id(), b"second").unwrap();
            store.update(b, b"second, revised").unwrap();
            store.flush().unwrap();
            save_registry(dir.path(), &config, &registry).unwrap();
            (a, b)
        };

        let store = FileObjectStore::open(dir.path(), &config).unwrap();
        assert_eq!(store.all_object_ids().unwrap(), vec![a, b]);
        assert_eq!(store.object_count().unwrap(), 2);
        assert_eq!(store.read(a).unwrap().data, b"first");
        assert_eq!(store.read(b).unwrap().data, b"second, revised");
        assert!(store.class_oid("app::Person").is_some());

        let reloaded = load_registry(dir.path(), &config).unwrap();
        let record = store.read(a).unwrap();
        assert_eq!(reloaded.resolve_by_id(record.type_id).unwrap().name(), "app::Person");
    }

    #[test]
    fn missing_catalog_gives_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let registry = load_registry(dir.path(), &StoreConfig::default()).unwrap();
        assert_eq!(registry.dynamic_count(), 0);
    }
}
