use objdb_io::IoError;
use objdb_meta::MetaError;
use objdb_oid::OidError;
use objdb_types::{ClassOid, ObjectOid, Position};

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The class an object was stored under is not registered or was deleted.
    #[error("unknown class: {0}")]
    UnknownClass(ClassOid),

    /// An identifier resolved to a record of the other kind.
    #[error("record at {position} is not an object record (resolving {oid})")]
    NotAnObject { oid: ObjectOid, position: Position },

    #[error("record at {position} is not a class record (resolving {oid})")]
    NotAClass { oid: ClassOid, position: Position },

    /// The record payload could not be decoded.
    #[error("corrupt record at {position}: {reason}")]
    CorruptRecord { position: Position, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Oid(#[from] OidError),

    #[error(transparent)]
    Meta(#[from] MetaError),

    #[error(transparent)]
    Io(#[from] IoError),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(IoError::Io(e))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
