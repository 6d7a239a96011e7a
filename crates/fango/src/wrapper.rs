//! Per-database persistence handle.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use fango_store::{DocumentClient, DocumentCollection, DocumentDatabase};
use fango_types::{id_query, DocPath, Document, DocumentId, MetaData, ID_KEY, NAME_KEY};
use serde_json::Value;
use tracing::debug;

use crate::error::{OdmError, OdmResult};
use crate::field::ID_FIELD;
use crate::model::Model;
use crate::object::Object;

/// Something the wrapper can write to a collection.
pub trait Persistable {
    /// Collection the entity belongs to.
    fn collection(&self) -> &str;

    /// Storage identifier, if the entity was persisted before.
    fn identifier(&self) -> Option<&DocumentId>;

    /// The document to store, in write mode (no identifier key).
    fn write_document(&mut self) -> OdmResult<Document>;

    /// Record the identifier assigned by the store.
    fn assign_identifier(&mut self, id: DocumentId) -> OdmResult<()>;
}

/// Create, insert, and find operations against one database.
///
/// Wrappers are shared through `Arc` by the registry and by every object
/// they create.
pub struct PersistenceWrapper {
    client: Arc<dyn DocumentClient>,
    database: Arc<dyn DocumentDatabase>,
    dbname: String,
    actor: String,
}

impl PersistenceWrapper {
    /// Wrap database `dbname` of `client`. `actor` is recorded in the
    /// metadata of objects created and written through this wrapper.
    pub fn new(client: Arc<dyn DocumentClient>, dbname: &str, actor: &str) -> Self {
        let database = client.database(dbname);
        Self {
            client,
            database,
            dbname: dbname.to_string(),
            actor: actor.to_string(),
        }
    }

    pub fn dbname(&self) -> &str {
        &self.dbname
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn client(&self) -> &Arc<dyn DocumentClient> {
        &self.client
    }

    /// Create an object of model `M`.
    ///
    /// When `path` is non-empty and a document with that name exists in
    /// the path's collection, the stored document is loaded and the
    /// caller's `kwargs` are laid over it: on a shared key the caller wins.
    pub fn new_object<M: Model>(
        self: &Arc<Self>,
        path: Option<&str>,
        kwargs: Document,
    ) -> OdmResult<Object<M>> {
        let mut merged = self.load::<M>(path)?.unwrap_or_default();
        merged.extend(kwargs);
        Object::construct(Arc::clone(self), path, merged)
    }

    /// Like [`new_object`](Self::new_object), but the result is never bound
    /// to a document already at `path`: its identifier and metadata are
    /// dropped from the merge.
    pub(crate) fn new_unsaved<M: Model>(
        self: &Arc<Self>,
        path: Option<&str>,
        kwargs: Document,
    ) -> OdmResult<Object<M>> {
        let mut merged = self.load::<M>(path)?.unwrap_or_default();
        merged.retain(|key, _| !MetaData::is_meta_key(key) && key != ID_FIELD);
        merged.extend(kwargs);
        Object::construct(Arc::clone(self), path, merged)
    }

    fn load<M: Model>(&self, path: Option<&str>) -> OdmResult<Option<Document>> {
        let Some(target) = path.and_then(DocPath::parse) else {
            return Ok(None);
        };
        let mut query = Document::new();
        query.insert(NAME_KEY.to_string(), Value::String(target.name.clone()));
        let found = self.find_one(&target.collection, &query)?;
        if found.is_some() {
            debug!(model = M::TYPE_NAME, path = %target, "loaded existing document");
        }
        Ok(found)
    }

    /// First document of `collection` matching `query`.
    pub fn find_one(&self, collection: &str, query: &Document) -> OdmResult<Option<Document>> {
        Ok(self.database.collection(collection).find_one(query)?)
    }

    /// Number of documents of `collection` matching `query`.
    pub fn count(&self, collection: &str, query: &Document) -> OdmResult<u64> {
        Ok(self.database.collection(collection).count(query)?)
    }

    /// Write one entity: replace it by identifier if it has one, insert it
    /// and record the new identifier otherwise.
    pub fn insert<E: Persistable + ?Sized>(&self, entity: &mut E) -> OdmResult<()> {
        let collection = self.database.collection(entity.collection());
        let document = entity.write_document()?;
        match entity.identifier().cloned() {
            Some(id) => self.upsert(collection.as_ref(), &id, document),
            None => {
                let id = collection.insert(document)?;
                debug!(collection = collection.name(), %id, "inserted document");
                entity.assign_identifier(id)
            }
        }
    }

    /// Write several entities, grouped by their own collections.
    ///
    /// Entities with an identifier are replaced one by one; the rest of each
    /// collection's group goes in one batch insert, and the returned
    /// identifiers are assigned in order. A failing batch aborts the call
    /// with that group's identifiers unassigned.
    pub fn insert_many<'a, E, I>(&self, entities: I) -> OdmResult<()>
    where
        E: Persistable + ?Sized + 'a,
        I: IntoIterator<Item = &'a mut E>,
    {
        let mut groups: BTreeMap<String, Vec<&'a mut E>> = BTreeMap::new();
        for entity in entities {
            groups
                .entry(entity.collection().to_string())
                .or_default()
                .push(entity);
        }

        for (name, group) in groups {
            let collection = self.database.collection(&name);
            let mut pending = Vec::new();
            let mut documents = Vec::new();
            for entity in group {
                let document = entity.write_document()?;
                match entity.identifier().cloned() {
                    Some(id) => self.upsert(collection.as_ref(), &id, document)?,
                    None => {
                        documents.push(document);
                        pending.push(entity);
                    }
                }
            }
            if documents.is_empty() {
                continue;
            }

            let expected = documents.len();
            let ids = collection.insert_many(documents)?;
            if ids.len() != expected {
                return Err(OdmError::BatchMismatch {
                    collection: name,
                    expected,
                    returned: ids.len(),
                });
            }
            for (entity, id) in pending.into_iter().zip(ids) {
                entity.assign_identifier(id)?;
            }
            debug!(collection = %name, count = expected, "batch inserted documents");
        }
        Ok(())
    }

    /// Replace the document with identifier `id`, inserting it under that
    /// identifier when it is gone.
    fn upsert(
        &self,
        collection: &dyn DocumentCollection,
        id: &DocumentId,
        mut document: Document,
    ) -> OdmResult<()> {
        let outcome = collection.update(&id_query(id), document.clone())?;
        if outcome.matched == 0 {
            document.insert(ID_KEY.to_string(), id.clone().into());
            collection.insert(document)?;
            debug!(collection = collection.name(), %id, "upserted missing document");
        } else {
            debug!(collection = collection.name(), %id, "updated document");
        }
        Ok(())
    }
}

impl fmt::Debug for PersistenceWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceWrapper")
            .field("dbname", &self.dbname)
            .field("actor", &self.actor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fango_store::{
        ConnectionKey, Connector, StoreError, StoreResult, UpdateOutcome,
    };
    use serde_json::json;

    use super::*;
    use crate::testing::{doc, registry, Task};
    use crate::ConnectionRegistry;

    #[test]
    fn insert_assigns_identifier_then_updates() {
        let db = registry().connect(&Default::default()).unwrap();
        let mut task: Object<Task> = db.new_object(Some("tasks/a"), Document::new()).unwrap();

        db.insert(&mut task).unwrap();
        let id = task.id().cloned().unwrap();
        assert!(!id.as_str().is_empty());
        assert_eq!(task.get("Id").unwrap(), json!(id.as_str()));

        task.set("Data", json!({"done": true})).unwrap();
        db.insert(&mut task).unwrap();
        assert_eq!(task.id(), Some(&id));
        assert_eq!(db.count("tasks", &Document::new()).unwrap(), 1);

        let stored = db.find_one("tasks", &id_query(&id)).unwrap().unwrap();
        assert_eq!(stored.get("Data"), Some(&json!({"done": true})));
        assert_eq!(stored.get("Id"), Some(&json!(id.as_str())));
    }

    #[test]
    fn upsert_recreates_missing_document() {
        let db = registry().connect(&Default::default()).unwrap();
        let mut task: Object<Task> = db
            .new_object(Some("tasks/ghost"), doc(json!({"_id": "gone"})))
            .unwrap();

        db.insert(&mut task).unwrap();
        let stored = db
            .find_one("tasks", &id_query(&DocumentId::new("gone")))
            .unwrap()
            .unwrap();
        assert_eq!(stored.get("Name"), Some(&json!("ghost")));
    }

    #[test]
    fn find_one_miss_is_none() {
        let db = registry().connect(&Default::default()).unwrap();
        assert!(db
            .find_one("nowhere", &doc(json!({"Name": "x"})))
            .unwrap()
            .is_none());
    }

    #[test]
    fn new_object_loads_existing_document() {
        let db = registry().connect(&Default::default()).unwrap();
        let mut original: Object<Task> = db
            .new_object(Some("col/name"), doc(json!({"Data": {"stored": 1}})))
            .unwrap();
        original.insert(None).unwrap();

        let loaded: Object<Task> = db.new_object(Some("col/name"), Document::new()).unwrap();
        assert_eq!(loaded.get("Data").unwrap(), json!({"stored": 1}));
        assert_eq!(loaded.id(), original.id());
        assert_eq!(loaded.meta().created_at, original.meta().created_at);
    }

    #[test]
    fn caller_kwargs_win_over_loaded_values() {
        let db = registry().connect(&Default::default()).unwrap();
        let mut original: Object<Task> = db
            .new_object(
                Some("col/prec"),
                doc(json!({"Data": {"stored": 1}, "Summary": "stored"})),
            )
            .unwrap();
        original.insert(None).unwrap();

        let loaded: Object<Task> = db
            .new_object(Some("col/prec"), doc(json!({"Data": {"caller": 2}})))
            .unwrap();
        assert_eq!(loaded.get("Data").unwrap(), json!({"caller": 2}));
        assert_eq!(loaded.get("Summary").unwrap(), json!("stored"));

        let mut loaded = loaded;
        loaded.insert(None).unwrap();
        assert_eq!(db.count("col", &Document::new()).unwrap(), 1);
    }

    #[test]
    fn insert_many_groups_by_each_entity_collection() {
        let db = registry().connect(&Default::default()).unwrap();
        let mut existing: Object<Task> = db.new_object(Some("a/existing"), Document::new()).unwrap();
        existing.insert(None).unwrap();
        let existing_id = existing.id().cloned().unwrap();
        existing.set("Data", json!({"rev": 2})).unwrap();

        let mut batch: Vec<Object<Task>> = vec![
            db.new_object(Some("a/one"), Document::new()).unwrap(),
            db.new_object(Some("b/two"), Document::new()).unwrap(),
            existing,
            db.new_object(Some("a/three"), Document::new()).unwrap(),
        ];
        db.insert_many(&mut batch).unwrap();

        assert!(batch.iter().all(|task| task.id().is_some()));
        assert_eq!(batch[2].id(), Some(&existing_id));
        assert_eq!(db.count("a", &Document::new()).unwrap(), 3);
        assert_eq!(db.count("b", &Document::new()).unwrap(), 1);

        for task in &batch {
            let stored = db
                .find_one(task.collection(), &id_query(task.id().unwrap()))
                .unwrap()
                .unwrap();
            assert_eq!(stored.get("Name"), Some(&json!(task.name().unwrap())));
        }
        let updated = db.find_one("a", &id_query(&existing_id)).unwrap().unwrap();
        assert_eq!(updated.get("Data"), Some(&json!({"rev": 2})));
    }

    #[test]
    fn insert_many_accepts_trait_objects() {
        let db = registry().connect(&Default::default()).unwrap();
        let mut first: Object<Task> = db.new_object(Some("mixed/1"), Document::new()).unwrap();
        let mut second: Object<Task> = db.new_object(Some("other/2"), Document::new()).unwrap();

        let entities: Vec<&mut dyn Persistable> = vec![&mut first, &mut second];
        db.insert_many(entities).unwrap();
        assert!(first.id().is_some());
        assert!(second.id().is_some());
    }

    /// How a [`Broken`] backend answers batch inserts.
    #[derive(Clone, Copy)]
    enum Batch {
        /// One identifier fewer than asked for.
        Short,
        Fail,
    }

    /// Backend that rejects single inserts, accepts every update, and
    /// answers batches per its [`Batch`] mode.
    struct Broken(Batch);

    struct BrokenClient(Batch);
    struct BrokenDatabase(Batch);
    struct BrokenCollection(Batch);

    impl Connector for Broken {
        fn connect(&self, _key: &ConnectionKey) -> StoreResult<Arc<dyn DocumentClient>> {
            Ok(Arc::new(BrokenClient(self.0)))
        }
    }

    impl DocumentClient for BrokenClient {
        fn database(&self, _name: &str) -> Arc<dyn DocumentDatabase> {
            Arc::new(BrokenDatabase(self.0))
        }
    }

    impl DocumentDatabase for BrokenDatabase {
        fn name(&self) -> &str {
            "broken"
        }

        fn collection(&self, _name: &str) -> Arc<dyn DocumentCollection> {
            Arc::new(BrokenCollection(self.0))
        }
    }

    impl DocumentCollection for BrokenCollection {
        fn name(&self) -> &str {
            "broken"
        }

        fn find_one(&self, _query: &Document) -> StoreResult<Option<Document>> {
            Ok(None)
        }

        fn insert(&self, _document: Document) -> StoreResult<DocumentId> {
            Err(StoreError::Backend("disk full".into()))
        }

        fn insert_many(&self, documents: Vec<Document>) -> StoreResult<Vec<DocumentId>> {
            match self.0 {
                Batch::Short => Ok((1..documents.len())
                    .map(|i| DocumentId::new(i.to_string()))
                    .collect()),
                Batch::Fail => Err(StoreError::Backend("batch rejected".into())),
            }
        }

        fn update(&self, _query: &Document, _replacement: Document) -> StoreResult<UpdateOutcome> {
            Ok(UpdateOutcome { matched: 1 })
        }

        fn count(&self, _query: &Document) -> StoreResult<u64> {
            Ok(0)
        }
    }

    fn broken(batch: Batch) -> Arc<PersistenceWrapper> {
        ConnectionRegistry::new(Arc::new(Broken(batch)))
            .with_actor("tester")
            .wrapper(&Default::default())
            .unwrap()
    }

    #[test]
    fn backend_errors_propagate() {
        let db = broken(Batch::Short);
        let mut task: Object<Task> = db.new_object(Some("x/y"), Document::new()).unwrap();
        let err = db.insert(&mut task).unwrap_err();
        assert!(matches!(err, OdmError::Store(StoreError::Backend(_))));
        assert!(task.id().is_none());
    }

    #[test]
    fn short_batch_is_rejected_without_backfill() {
        let db = broken(Batch::Short);
        let mut batch: Vec<Object<Task>> = vec![
            db.new_object(Some("x/1"), Document::new()).unwrap(),
            db.new_object(Some("x/2"), Document::new()).unwrap(),
        ];
        let err = db.insert_many(&mut batch).unwrap_err();
        assert!(matches!(
            err,
            OdmError::BatchMismatch { expected: 2, returned: 1, .. }
        ));
        assert!(batch.iter().all(|task| task.id().is_none()));
    }

    #[test]
    fn failed_batch_aborts_after_upserts() {
        let db = broken(Batch::Fail);
        let mut batch: Vec<Object<Task>> = vec![
            db.new_object(Some("x/kept"), doc(json!({"_id": "kept"}))).unwrap(),
            db.new_object(Some("x/1"), Document::new()).unwrap(),
            db.new_object(Some("x/2"), Document::new()).unwrap(),
        ];

        let err = db.insert_many(&mut batch).unwrap_err();
        assert!(matches!(err, OdmError::Store(StoreError::Backend(_))));
        assert_eq!(batch[0].id(), Some(&DocumentId::new("kept")));
        assert!(batch[1..].iter().all(|task| task.id().is_none()));
    }
}
