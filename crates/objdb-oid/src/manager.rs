use objdb_io::StorageChannel;
use objdb_types::{AnyOid, ClassOid, ObjectOid, Position};

use crate::error::OidResult;
use crate::memory::InMemoryIdentityTable;
use crate::persistent::PersistentIdentityTable;
use crate::table::IdentityTable;

/// The object and class identity tables of one database.
pub struct IdentityManager<OT, CT> {
    objects: OT,
    classes: CT,
}

impl IdentityManager<InMemoryIdentityTable<ObjectOid>, InMemoryIdentityTable<ClassOid>> {
    pub fn in_memory() -> Self {
        Self::new(InMemoryIdentityTable::new(), InMemoryIdentityTable::new())
    }
}

impl<C1: StorageChannel, C2: StorageChannel>
    IdentityManager<PersistentIdentityTable<ObjectOid, C1>, PersistentIdentityTable<ClassOid, C2>>
{
    /// Open both tables from their channels.
    pub fn open(objects: C1, classes: C2) -> OidResult<Self> {
        Ok(Self::new(
            PersistentIdentityTable::open(objects)?,
            PersistentIdentityTable::open(classes)?,
        ))
    }

    pub fn flush(&self) -> OidResult<()> {
        self.objects.flush()?;
        self.classes.flush()
    }
}

impl<OT, CT> IdentityManager<OT, CT>
where
    OT: IdentityTable<ObjectOid>,
    CT: IdentityTable<ClassOid>,
{
    pub fn new(objects: OT, classes: CT) -> Self {
        Self { objects, classes }
    }

    pub fn objects(&self) -> &OT {
        &self.objects
    }

    pub fn classes(&self) -> &CT {
        &self.classes
    }

    /// Resolve an identifier of either kind in its own table.
    pub fn resolve_any(&self, oid: AnyOid) -> OidResult<Position> {
        match oid {
            AnyOid::Object(oid) => self.objects.resolve(oid),
            AnyOid::Class(oid) => self.classes.resolve(oid),
        }
    }

    /// Invalidate an identifier of either kind in its own table.
    pub fn invalidate_any(&self, oid: AnyOid) -> OidResult<()> {
        match oid {
            AnyOid::Object(oid) => self.objects.invalidate(oid),
            AnyOid::Class(oid) => self.classes.invalidate(oid),
        }
    }
}
