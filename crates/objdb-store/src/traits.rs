use objdb_meta::TypeDescriptor;
use objdb_types::{ClassOid, ObjectOid, TypeId};

use crate::error::StoreResult;
use crate::record::{ClassRecord, ObjectRecord};

/// OID-addressed record store.
///
/// All implementations must satisfy these invariants:
/// - Records are never modified in place. An update writes a new record and
///   rebinds the identifier to it.
/// - An identifier is handed out only after its record is written, so a
///   failed write never leaves a live identifier without a record.
/// - Deleting invalidates the identifier. The value is never reused.
/// - The store never interprets object data.
pub trait ObjectStore: Send + Sync {
    /// Register a class, returning its existing identifier if a class with
    /// the same canonical name is already registered.
    fn register_class(&self, descriptor: &TypeDescriptor) -> StoreResult<ClassOid>;

    /// Identifier of the class registered under `name`.
    fn class_oid(&self, name: &str) -> Option<ClassOid>;

    fn read_class(&self, oid: ClassOid) -> StoreResult<ClassRecord>;

    /// Write a new object record under a registered class.
    fn store(&self, class: ClassOid, type_id: TypeId, data: &[u8]) -> StoreResult<ObjectOid>;

    fn read(&self, oid: ObjectOid) -> StoreResult<ObjectRecord>;

    /// Replace the data of a live object. Its class and type are kept.
    fn update(&self, oid: ObjectOid, data: &[u8]) -> StoreResult<()>;

    fn delete(&self, oid: ObjectOid) -> StoreResult<()>;

    /// Live object identifiers in ascending order.
    fn all_object_ids(&self) -> StoreResult<Vec<ObjectOid>>;

    /// Registered class identifiers in ascending order.
    fn all_class_ids(&self) -> StoreResult<Vec<ClassOid>>;

    fn exists(&self, oid: ObjectOid) -> StoreResult<bool> {
        Ok(self.all_object_ids()?.binary_search(&oid).is_ok())
    }

    fn object_count(&self) -> StoreResult<usize> {
        Ok(self.all_object_ids()?.len())
    }
}
