use objdb_io::IoError;
use objdb_types::{Oid, OidKind};

/// Errors from identity table operations.
#[derive(Debug, thiserror::Error)]
pub enum OidError {
    /// The identifier was never allocated by this table.
    #[error("unknown {kind} identifier {value}")]
    UnknownOid { kind: OidKind, value: u64 },

    /// The identifier was invalidated.
    #[error("{kind} identifier {value} was deleted")]
    DeletedOid { kind: OidKind, value: u64 },

    /// The identifier was allocated but never bound to a position.
    #[error("{kind} identifier {value} is not bound to a position")]
    UnboundOid { kind: OidKind, value: u64 },

    /// The allocation counter pointed at a live identifier.
    #[error("{kind} identifier {value} allocated twice")]
    DuplicateOidAllocation { kind: OidKind, value: u64 },

    /// A persisted record failed validation.
    #[error("corrupt identity record {value}: {reason}")]
    CorruptRecord { value: u64, reason: String },

    /// The persisted table header is malformed.
    #[error("corrupt identity table header: {0}")]
    CorruptHeader(String),

    /// Storage channel failure.
    #[error("storage error: {0}")]
    Io(#[from] IoError),
}

impl OidError {
    pub fn unknown<O: Oid>(oid: O) -> Self {
        Self::UnknownOid {
            kind: O::KIND,
            value: oid.value(),
        }
    }

    pub fn deleted<O: Oid>(oid: O) -> Self {
        Self::DeletedOid {
            kind: O::KIND,
            value: oid.value(),
        }
    }

    pub fn unbound<O: Oid>(oid: O) -> Self {
        Self::UnboundOid {
            kind: O::KIND,
            value: oid.value(),
        }
    }

    pub fn duplicate<O: Oid>(oid: O) -> Self {
        Self::DuplicateOidAllocation {
            kind: O::KIND,
            value: oid.value(),
        }
    }
}

/// Result alias for identity table operations.
pub type OidResult<T> = Result<T, OidError>;
