use thiserror::Error;

use crate::document::DocumentId;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    /// The storage identifier of an entity can only be assigned once.
    #[error("identifier already assigned: {existing}")]
    IdentifierAlreadyAssigned { existing: DocumentId },

    /// A metadata key holds a value of the wrong shape.
    #[error("invalid metadata {key}: {reason}")]
    InvalidMetadata { key: String, reason: String },
}

/// Result alias for type operations.
pub type TypeResult<T> = Result<T, TypeError>;
