use thiserror::Error;

/// Errors from object-document mapping operations.
#[derive(Debug, Error)]
pub enum OdmError {
    /// The storage backend failed a find, insert, or update.
    #[error("store error: {0}")]
    Store(#[from] fango_store::StoreError),

    /// Metadata or identifier bookkeeping failed.
    #[error("type error: {0}")]
    Type(#[from] fango_types::TypeError),

    /// The field is not declared on the model.
    #[error("unknown field {field} on {model}")]
    UnknownField { model: &'static str, field: String },

    /// A stored field function failed. Failures are never memoized.
    #[error(transparent)]
    Compute(#[from] anyhow::Error),

    /// A batch insert returned a different number of identifiers than
    /// documents were sent.
    #[error("batch insert into {collection} returned {returned} identifiers for {expected} documents")]
    BatchMismatch {
        collection: String,
        expected: usize,
        returned: usize,
    },

    /// Encoding field arguments failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration could not be parsed.
    #[error("config error: {0}")]
    Config(String),

    /// A registry or field cache lock was poisoned.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result alias for mapping operations.
pub type OdmResult<T> = Result<T, OdmError>;
