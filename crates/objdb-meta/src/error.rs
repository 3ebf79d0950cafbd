use objdb_types::TypeId;

/// Errors from type registry operations.
#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    /// No descriptor is registered under this id.
    #[error("unknown type id: {0}")]
    UnknownTypeId(TypeId),

    /// The persisted type catalog is malformed.
    #[error("corrupt type catalog: {0}")]
    CorruptCatalog(String),

    /// A catalog entry names an id or name already bound differently.
    #[error("catalog conflict for type {name:?}: id {id} already registered")]
    CatalogConflict { id: TypeId, name: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Storage channel failure.
    #[error("storage error: {0}")]
    Io(#[from] objdb_io::IoError),
}

/// Result alias for registry operations.
pub type MetaResult<T> = Result<T, MetaError>;
