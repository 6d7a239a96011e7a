//! In-memory document backend for tests and embedding.
//!
//! Servers are keyed by [`ConnectionKey::address`], so every client opened
//! for the same address sees the same databases, as with a real server.
//! All state lives in `HashMap`s behind `RwLock`s and is lost when the
//! connector is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use fango_types::{Document, DocumentId, ID_KEY};
use serde_json::Value;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::key::ConnectionKey;
use crate::traits::{Connector, DocumentClient, DocumentCollection, DocumentDatabase, UpdateOutcome};

type Databases = RwLock<HashMap<String, Arc<InMemoryDatabase>>>;

/// Connector that opens clients onto in-process servers.
#[derive(Default)]
pub struct InMemoryConnector {
    servers: RwLock<HashMap<String, Arc<Databases>>>,
    opened: AtomicUsize,
}

impl InMemoryConnector {
    /// Create a connector with no servers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of clients opened so far.
    pub fn clients_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl Connector for InMemoryConnector {
    fn connect(&self, key: &ConnectionKey) -> StoreResult<Arc<dyn DocumentClient>> {
        let address = key.address();
        let databases = {
            let mut servers = self
                .servers
                .write()
                .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
            Arc::clone(servers.entry(address.clone()).or_default())
        };
        let opened = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(%key, %address, opened, "opened in-memory client");
        Ok(Arc::new(InMemoryClient { databases }))
    }
}

/// Client handle onto one in-memory server.
pub struct InMemoryClient {
    databases: Arc<Databases>,
}

impl DocumentClient for InMemoryClient {
    fn database(&self, name: &str) -> Arc<dyn DocumentDatabase> {
        if let Ok(databases) = self.databases.read() {
            if let Some(db) = databases.get(name) {
                return Arc::clone(db) as Arc<dyn DocumentDatabase>;
            }
        }
        let mut databases = self
            .databases
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(
            databases
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(InMemoryDatabase::new(name))),
        ) as Arc<dyn DocumentDatabase>
    }
}

/// A database held in memory.
pub struct InMemoryDatabase {
    name: String,
    collections: RwLock<HashMap<String, Arc<InMemoryCollection>>>,
}

impl InMemoryDatabase {
    /// Create an empty database.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl DocumentDatabase for InMemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection> {
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(
            collections
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(InMemoryCollection::new(name))),
        ) as Arc<dyn DocumentCollection>
    }
}

/// A collection held in memory, in insertion order.
pub struct InMemoryCollection {
    name: String,
    documents: RwLock<Vec<Document>>,
}

impl InMemoryCollection {
    /// Create an empty collection.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            documents: RwLock::new(Vec::new()),
        }
    }

    /// Give `document` an identifier, keeping a string `_id` if present.
    fn identify(
        &self,
        document: &mut Document,
        existing: &[Document],
        staged: &[Document],
    ) -> StoreResult<DocumentId> {
        let id = match document.get(ID_KEY) {
            None | Some(Value::Null) => DocumentId::generate(),
            Some(Value::String(id)) => DocumentId::new(id.clone()),
            Some(other) => {
                return Err(StoreError::InvalidDocument(format!(
                    "{ID_KEY} must be a string, got {other}"
                )))
            }
        };
        let taken = existing
            .iter()
            .chain(staged)
            .any(|doc| DocumentId::from_document(doc).as_ref() == Some(&id));
        if taken {
            return Err(StoreError::DuplicateId {
                collection: self.name.clone(),
                id,
            });
        }
        document.insert(ID_KEY.to_string(), id.clone().into());
        Ok(id)
    }
}

fn matches(document: &Document, query: &Document) -> bool {
    query
        .iter()
        .all(|(key, expected)| document.get(key) == Some(expected))
}

impl DocumentCollection for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn find_one(&self, query: &Document) -> StoreResult<Option<Document>> {
        let docs = self
            .documents
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        Ok(docs.iter().find(|doc| matches(doc, query)).cloned())
    }

    fn insert(&self, mut document: Document) -> StoreResult<DocumentId> {
        let mut docs = self
            .documents
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        let id = self.identify(&mut document, &docs, &[])?;
        docs.push(document);
        Ok(id)
    }

    fn insert_many(&self, documents: Vec<Document>) -> StoreResult<Vec<DocumentId>> {
        let mut docs = self
            .documents
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        // All-or-nothing: identify the whole batch before storing any of it.
        let mut staged: Vec<Document> = Vec::with_capacity(documents.len());
        let mut ids = Vec::with_capacity(documents.len());
        for mut document in documents {
            ids.push(self.identify(&mut document, &docs, &staged)?);
            staged.push(document);
        }
        docs.extend(staged);
        Ok(ids)
    }

    fn update(&self, query: &Document, mut replacement: Document) -> StoreResult<UpdateOutcome> {
        let mut docs = self
            .documents
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        let Some(target) = docs.iter_mut().find(|doc| matches(doc, query)) else {
            return Ok(UpdateOutcome { matched: 0 });
        };
        match target.get(ID_KEY).cloned() {
            Some(id) => {
                replacement.insert(ID_KEY.to_string(), id);
            }
            None => {
                replacement.remove(ID_KEY);
            }
        }
        *target = replacement;
        Ok(UpdateOutcome { matched: 1 })
    }

    fn count(&self, query: &Document) -> StoreResult<u64> {
        let docs = self
            .documents
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        Ok(docs.iter().filter(|doc| matches(doc, query)).count() as u64)
    }
}
