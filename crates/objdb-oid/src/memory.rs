use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::RwLock;

use tracing::debug;

use objdb_types::{Oid, Position};

use crate::error::{OidError, OidResult};
use crate::table::{require_live, IdentityTable, OidState};

struct Slots {
    states: BTreeMap<u64, OidState>,
    next: u64,
}

/// In-memory identity table.
///
/// Holds every slot ever allocated, including deleted ones, behind a
/// `RwLock`. Intended for tests and in-memory databases.
pub struct InMemoryIdentityTable<O> {
    slots: RwLock<Slots>,
    _kind: PhantomData<fn() -> O>,
}

impl<O: Oid> InMemoryIdentityTable<O> {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Slots {
                states: BTreeMap::new(),
                next: 1,
            }),
            _kind: PhantomData,
        }
    }

    /// Number of slots ever allocated.
    pub fn allocated_count(&self) -> usize {
        self.slots.read().expect("lock poisoned").states.len()
    }
}

impl<O: Oid> Default for InMemoryIdentityTable<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Oid> IdentityTable<O> for InMemoryIdentityTable<O> {
    fn allocate(&self) -> OidResult<O> {
        let mut slots = self.slots.write().expect("lock poisoned");
        let oid = O::from_value(slots.next);
        if slots.states.get(&slots.next).is_some_and(OidState::is_live) {
            return Err(OidError::duplicate(oid));
        }
        let value = slots.next;
        slots.states.insert(value, OidState::Allocated);
        slots.next += 1;
        debug!(%oid, "allocated identifier");
        Ok(oid)
    }

    fn bind(&self, oid: O, position: Position) -> OidResult<()> {
        let mut slots = self.slots.write().expect("lock poisoned");
        let state = slots
            .states
            .get_mut(&oid.value())
            .ok_or_else(|| OidError::unknown(oid))?;
        require_live(oid, *state)?;
        *state = OidState::Bound(position);
        Ok(())
    }

    fn invalidate(&self, oid: O) -> OidResult<()> {
        let mut slots = self.slots.write().expect("lock poisoned");
        let state = slots
            .states
            .get_mut(&oid.value())
            .ok_or_else(|| OidError::unknown(oid))?;
        require_live(oid, *state)?;
        *state = OidState::Deleted;
        debug!(%oid, "invalidated identifier");
        Ok(())
    }

    fn state(&self, oid: O) -> OidResult<OidState> {
        let slots = self.slots.read().expect("lock poisoned");
        Ok(slots
            .states
            .get(&oid.value())
            .copied()
            .unwrap_or(OidState::Free))
    }

    fn live_ids(&self) -> OidResult<Vec<O>> {
        let slots = self.slots.read().expect("lock poisoned");
        Ok(slots
            .states
            .iter()
            .filter(|(_, state)| state.is_live())
            .map(|(value, _)| O::from_value(*value))
            .collect())
    }

    fn next_value(&self) -> u64 {
        self.slots.read().expect("lock poisoned").next
    }
}

impl<O: Oid> std::fmt::Debug for InMemoryIdentityTable<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryIdentityTable")
            .field("kind", &O::KIND)
            .field("next", &self.next_value())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objdb_types::{ClassOid, ObjectOid};
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn allocate_starts_at_one() {
        let table = InMemoryIdentityTable::<ObjectOid>::new();
        assert_eq!(table.allocate().unwrap(), ObjectOid::new(1));
        assert_eq!(table.allocate().unwrap(), ObjectOid::new(2));
        assert_eq!(table.next_value(), 3);
    }

    #[test]
    fn bind_then_resolve() {
        let table = InMemoryIdentityTable::<ObjectOid>::new();
        let oid = table.allocate().unwrap();
        table.bind(oid, Position::new(64)).unwrap();
        assert_eq!(table.resolve(oid).unwrap(), Position::new(64));

        table.bind(oid, Position::new(128)).unwrap();
        assert_eq!(table.resolve(oid).unwrap(), Position::new(128));
    }

    #[test]
    fn never_allocated_is_unknown() {
        let table = InMemoryIdentityTable::<ObjectOid>::new();
        assert!(matches!(
            table.resolve(ObjectOid::new(7)),
            Err(OidError::UnknownOid { value: 7, .. })
        ));
        assert!(matches!(
            table.resolve(ObjectOid::null()),
            Err(OidError::UnknownOid { value: 0, .. })
        ));
    }

    #[test]
    fn allocated_but_unbound() {
        let table = InMemoryIdentityTable::<ClassOid>::new();
        let oid = table.allocate().unwrap();
        assert!(matches!(table.resolve(oid), Err(OidError::UnboundOid { .. })));
        assert!(table.is_live(oid).unwrap());
    }

    #[test]
    fn invalidated_is_deleted() {
        let table = InMemoryIdentityTable::<ObjectOid>::new();
        let oid = table.allocate().unwrap();
        table.bind(oid, Position::new(8)).unwrap();
        table.invalidate(oid).unwrap();

        assert!(matches!(table.resolve(oid), Err(OidError::DeletedOid { .. })));
        assert!(matches!(
            table.bind(oid, Position::new(16)),
            Err(OidError::DeletedOid { .. })
        ));
        assert!(matches!(table.invalidate(oid), Err(OidError::DeletedOid { .. })));
        assert!(!table.is_live(oid).unwrap());
    }

    #[test]
    fn deleted_values_are_not_reused() {
        let table = InMemoryIdentityTable::<ObjectOid>::new();
        let a = table.allocate().unwrap();
        table.invalidate(a).unwrap();
        let b = table.allocate().unwrap();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn live_ids_ascending() {
        let table = InMemoryIdentityTable::<ObjectOid>::new();
        let ids: Vec<_> = (0..5).map(|_| table.allocate().unwrap()).collect();
        table.invalidate(ids[1]).unwrap();
        table.invalidate(ids[3]).unwrap();
        assert_eq!(table.live_ids().unwrap(), vec![ids[0], ids[2], ids[4]]);
        assert_eq!(table.live_count().unwrap(), 3);
        assert_eq!(table.allocated_count(), 5);
    }

    #[test]
    fn concurrent_allocation_is_unique() {
        let table = Arc::new(InMemoryIdentityTable::<ObjectOid>::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let table = Arc::clone(&table);
                thread::spawn(move || {
                    (0..250)
                        .map(|_| table.allocate().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for oid in handle.join().unwrap() {
                assert!(seen.insert(oid), "{oid} allocated twice");
            }
        }
        assert_eq!(seen.len(), 1000);
    }

    proptest::proptest! {
        #[test]
        fn live_ids_never_collide(ops in proptest::collection::vec(proptest::prelude::any::<bool>(), 1..200)) {
            let table = InMemoryIdentityTable::<ObjectOid>::new();
            let mut live: Vec<ObjectOid> = Vec::new();
            for allocate in ops {
                if allocate || live.is_empty() {
                    let oid = table.allocate().unwrap();
                    proptest::prop_assert!(!live.contains(&oid));
                    live.push(oid);
                } else {
                    let oid = live.remove(live.len() / 2);
                    table.invalidate(oid).unwrap();
                }
            }
            live.sort();
            proptest::prop_assert_eq!(table.live_ids().unwrap(), live);
        }
    }
}
