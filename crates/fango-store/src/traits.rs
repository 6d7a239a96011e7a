use std::sync::Arc;

use fango_types::{Document, DocumentId};

use crate::error::StoreResult;
use crate::key::ConnectionKey;

/// Result of a replace-by-query update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Number of documents that matched the query (0 or 1).
    pub matched: u64,
}

/// Opens client connections.
pub trait Connector: Send + Sync {
    /// Open a new client for `key`. Every call opens a new connection;
    /// callers that want sharing must cache the result.
    fn connect(&self, key: &ConnectionKey) -> StoreResult<Arc<dyn DocumentClient>>;
}

/// A connected client.
pub trait DocumentClient: Send + Sync {
    /// Handle to the named database. Databases are created lazily.
    fn database(&self, name: &str) -> Arc<dyn DocumentDatabase>;
}

/// A database: a namespace of collections.
pub trait DocumentDatabase: Send + Sync {
    /// Name of this database.
    fn name(&self) -> &str;

    /// Handle to the named collection. Collections are created lazily.
    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection>;
}

/// A collection of documents.
///
/// Queries are equality matches on top-level keys; an empty query matches
/// every document.
pub trait DocumentCollection: Send + Sync {
    /// Name of this collection.
    fn name(&self) -> &str;

    /// First document matching `query`, or `Ok(None)`.
    fn find_one(&self, query: &Document) -> StoreResult<Option<Document>>;

    /// Insert a new document and return its identifier. An `_id` already
    /// present in the document is kept.
    fn insert(&self, document: Document) -> StoreResult<DocumentId>;

    /// Insert several documents, returning identifiers in input order.
    ///
    /// Default implementation calls `insert()` for each document. Backends
    /// may override it for a single round-trip.
    fn insert_many(&self, documents: Vec<Document>) -> StoreResult<Vec<DocumentId>> {
        documents.into_iter().map(|doc| self.insert(doc)).collect()
    }

    /// Replace the first document matching `query` with `replacement`,
    /// keeping its identifier.
    fn update(&self, query: &Document, replacement: Document) -> StoreResult<UpdateOutcome>;

    /// Number of documents matching `query`.
    fn count(&self, query: &Document) -> StoreResult<u64>;
}
