use std::sync::Arc;

use objdb_types::{Oid, Position};

use crate::error::{OidError, OidResult};

/// State of one identifier slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OidState {
    /// Never allocated (includes the null identifier).
    Free,
    /// Allocated but not yet bound.
    Allocated,
    /// Bound to the position of its current record.
    Bound(Position),
    /// Invalidated; the value is never handed out again.
    Deleted,
}

impl OidState {
    /// Allocated or bound.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Allocated | Self::Bound(_))
    }
}

/// Allocation and resolution of one identifier kind.
///
/// Implementations must be thread-safe and must never return the same value
/// from two `allocate` calls.
pub trait IdentityTable<O: Oid>: Send + Sync {
    /// Hand out a fresh identifier.
    fn allocate(&self) -> OidResult<O>;

    /// Record (or move) the position of a live identifier.
    fn bind(&self, oid: O, position: Position) -> OidResult<()>;

    /// Mark a live identifier deleted.
    fn invalidate(&self, oid: O) -> OidResult<()>;

    /// Current state of the slot for `oid`.
    fn state(&self, oid: O) -> OidResult<OidState>;

    /// Live identifiers in ascending order.
    fn live_ids(&self) -> OidResult<Vec<O>>;

    /// The value the next `allocate` will return.
    fn next_value(&self) -> u64;

    /// Position of the record currently bound to `oid`.
    fn resolve(&self, oid: O) -> OidResult<Position> {
        match self.state(oid)? {
            OidState::Bound(position) => Ok(position),
            OidState::Allocated => Err(OidError::unbound(oid)),
            OidState::Deleted => Err(OidError::deleted(oid)),
            OidState::Free => Err(OidError::unknown(oid)),
        }
    }

    fn is_live(&self, oid: O) -> OidResult<bool> {
        Ok(self.state(oid)?.is_live())
    }

    fn live_count(&self) -> OidResult<usize> {
        Ok(self.live_ids()?.len())
    }
}

impl<O: Oid, T: IdentityTable<O> + ?Sized> IdentityTable<O> for Arc<T> {
    fn allocate(&self) -> OidResult<O> {
        (**self).allocate()
    }

    fn bind(&self, oid: O, position: Position) -> OidResult<()> {
        (**self).bind(oid, position)
    }

    fn invalidate(&self, oid: O) -> OidResult<()> {
        (**self).invalidate(oid)
    }

    fn state(&self, oid: O) -> OidResult<OidState> {
        (**self).state(oid)
    }

    fn live_ids(&self) -> OidResult<Vec<O>> {
        (**self).live_ids()
    }

    fn next_value(&self) -> u64 {
        (**self).next_value()
    }

    fn resolve(&self, oid: O) -> OidResult<Position> {
        (**self).resolve(oid)
    }

    fn live_count(&self) -> OidResult<usize> {
        (**self).live_count()
    }
}

/// Check that `oid` may be bound or invalidated given its current state.
pub(crate) fn require_live<O: Oid>(oid: O, state: OidState) -> OidResult<()> {
    match state {
        OidState::Allocated | OidState::Bound(_) => Ok(()),
        OidState::Deleted => Err(OidError::deleted(oid)),
        OidState::Free => Err(OidError::unknown(oid)),
    }
}
