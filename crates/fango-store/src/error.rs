use fango_types::DocumentId;

/// Errors from document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("backend error: {0}")]
    Backend(String),

    /// A document with this identifier already exists in the collection.
    #[error("duplicate identifier {id} in collection {collection}")]
    DuplicateId { collection: String, id: DocumentId },

    /// The document cannot be stored as given.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// A lock guarding backend state was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
