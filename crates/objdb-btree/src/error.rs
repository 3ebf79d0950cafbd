use objdb_io::IoError;
use objdb_meta::MetaError;
use objdb_oid::OidError;

use crate::node::NodeHandle;

/// Errors from B-tree operations.
#[derive(Debug, thiserror::Error)]
pub enum BTreeError {
    /// The key type has no total order.
    #[error("key type {type_name} is not orderable")]
    NonOrderableKeyType { type_name: String },

    /// Orders below 3 cannot keep the tree balanced.
    #[error("invalid tree order {0}: must be at least 3")]
    InvalidOrder(usize),

    /// A stored node is unreadable or breaks a structural invariant.
    #[error("corrupt node {handle}: {reason}")]
    CorruptNode { handle: NodeHandle, reason: String },

    /// The persister holds no node under this handle.
    #[error("node not found: {0}")]
    NodeNotFound(NodeHandle),

    /// The persister holds no root record.
    #[error("no tree root stored")]
    MissingRoot,

    /// The stored root was written for a different key type or variant.
    #[error("stored tree root does not match: {0}")]
    RootMismatch(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Storage channel failure.
    #[error("storage error: {0}")]
    Io(#[from] IoError),

    /// Identity table failure.
    #[error("identity error: {0}")]
    Oid(#[from] OidError),

    /// Type registry failure.
    #[error("type error: {0}")]
    Meta(#[from] MetaError),
}

/// Result alias for B-tree operations.
pub type BTreeResult<T> = Result<T, BTreeError>;
