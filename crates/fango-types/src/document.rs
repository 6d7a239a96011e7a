//! Documents as persisted, and the identifiers the backend assigns them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored document: a JSON object keyed by field name.
pub type Document = Map<String, Value>;

/// Key under which the storage identifier is persisted.
pub const ID_KEY: &str = "_id";

/// Key of the name field, the lookup key of a document within its collection.
pub const NAME_KEY: &str = "Name";

/// Storage identifier of a persisted document.
///
/// Identifiers are opaque strings chosen by the backend. The in-memory
/// backend uses time-ordered UUID v7 values.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wrap an identifier produced by a backend.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh time-ordered identifier (UUID v7).
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().simple().to_string())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read an identifier from a document's `_id` key, if it holds a string.
    pub fn from_document(document: &Document) -> Option<Self> {
        document
            .get(ID_KEY)
            .and_then(Value::as_str)
            .map(Self::new)
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<DocumentId> for Value {
    fn from(id: DocumentId) -> Self {
        Value::String(id.0)
    }
}

/// Equality query matching the document with the given identifier.
pub fn id_query(id: &DocumentId) -> Document {
    let mut query = Document::new();
    query.insert(ID_KEY.to_string(), id.clone().into());
    query
}
