use thiserror::Error;

use crate::oid::OidKind;

/// Errors produced by foundation type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid {kind} identifier: {input:?}")]
    InvalidOid { kind: OidKind, input: String },

    #[error("null {0} identifier is not allowed here")]
    NullOid(OidKind),
}
