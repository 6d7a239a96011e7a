//! Mapped objects: path-addressed documents with stored fields.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;
use fango_types::{DocPath, Document, DocumentId, MetaData};
use serde_json::Value;
use tracing::debug;

use crate::error::{OdmError, OdmResult};
use crate::field::{Field, FieldArgs, FieldCache, ID_FIELD, NAME_FIELD};
use crate::model::Model;
use crate::wrapper::{Persistable, PersistenceWrapper};

/// An instance of model `M`, bound to the wrapper that created it.
///
/// Objects are built by [`PersistenceWrapper::new_object`] or
/// [`Object::copy`]. The wrapper is shared; dropping an object never touches
/// the stored document.
pub struct Object<M> {
    wrapper: Arc<PersistenceWrapper>,
    collection: String,
    fields: FieldCache,
    meta: MetaData,
    model: PhantomData<fn() -> M>,
}

impl<M: Model> Object<M> {
    /// Build an object from construction kwargs.
    ///
    /// A non-empty `path` places the object in its collection and fixes its
    /// `Name`; otherwise it lands in the `tmp/<TypeName>` scratch
    /// collection. Metadata comes from the kwargs or fresh defaults, every
    /// stored field present in the kwargs is seeded without computing,
    /// and a still missing `Name` is computed before returning.
    pub(crate) fn construct(
        wrapper: Arc<PersistenceWrapper>,
        path: Option<&str>,
        mut kwargs: Document,
    ) -> OdmResult<Self> {
        let collection = match path.and_then(DocPath::parse) {
            Some(target) => {
                kwargs.insert(NAME_FIELD.to_string(), Value::String(target.name));
                target.collection
            }
            None => DocPath::scratch_collection(M::TYPE_NAME),
        };
        let meta = MetaData::from_document(&kwargs, wrapper.actor(), Utc::now())?;

        let mut object = Self {
            wrapper,
            collection,
            fields: FieldCache::default(),
            meta,
            model: PhantomData,
        };
        for name in M::fields().names() {
            if let Some(value) = kwargs.remove(name) {
                object.fields.assign(name, value)?;
            }
        }
        if let Some(id) = object.meta.id().cloned() {
            object.fields.assign(ID_FIELD, id.into())?;
        }
        object.get(NAME_FIELD)?;
        Ok(object)
    }

    fn field(&self, name: &str) -> OdmResult<&'static Field<M>> {
        M::fields().get(name).ok_or_else(|| OdmError::UnknownField {
            model: M::TYPE_NAME,
            field: name.to_string(),
        })
    }

    /// Current value of a field, computing and memoizing it on first read.
    pub fn get(&self, name: &str) -> OdmResult<Value> {
        let field = self.field(name)?;
        if let Some(value) = self.fields.current(field.name())? {
            return Ok(value);
        }
        let value = field.compute(self, &FieldArgs::new())?;
        debug!(model = M::TYPE_NAME, field = field.name(), "computed field");
        self.fields.remember(field.name(), value.clone())?;
        Ok(value)
    }

    /// Call a field with arguments.
    ///
    /// Results are memoized per argument set. A fresh computation also
    /// becomes the field's current value. Empty arguments behave like
    /// [`get`](Self::get).
    pub fn call(&self, name: &str, args: &FieldArgs) -> OdmResult<Value> {
        if args.is_empty() {
            return self.get(name);
        }
        let field = self.field(name)?;
        let key = args.call_key(field.name())?;
        if let Some(value) = self.fields.call(&key)? {
            return Ok(value);
        }
        let value = field.compute(self, args)?;
        debug!(model = M::TYPE_NAME, field = field.name(), ?args, "computed field call");
        self.fields.remember_call(key, value.clone())?;
        Ok(value)
    }

    /// Assign a field's current value without computing it.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> OdmResult<()> {
        let field = self.field(name)?;
        self.fields.assign(field.name(), value.into())
    }

    /// Current value of a field if it was computed or assigned, without
    /// computing it.
    pub fn cached(&self, name: &str) -> OdmResult<Option<Value>> {
        let field = self.field(name)?;
        self.fields.current(field.name())
    }

    /// The document name.
    pub fn name(&self) -> OdmResult<String> {
        Ok(match self.get(NAME_FIELD)? {
            Value::String(name) => name,
            other => other.to_string(),
        })
    }

    /// Full path of the document, `collection/name`.
    pub fn path(&self) -> OdmResult<String> {
        Ok(DocPath::join(&self.collection, &self.name()?))
    }

    /// Serialize every stored field plus the metadata.
    ///
    /// With `write` set, the updated-by/at metadata is refreshed first and
    /// the storage identifier is left out.
    pub fn serialize(&mut self, write: bool) -> OdmResult<Document> {
        let mut document = Document::new();
        for name in M::fields().names() {
            document.insert(name.to_string(), self.get(name)?);
        }
        if write {
            self.meta.touch(self.wrapper.actor(), Utc::now());
        }
        self.meta.write_into(&mut document, !write);
        Ok(document)
    }

    /// Persist the object, optionally moving it to `path` first.
    pub fn insert(&mut self, path: Option<&str>) -> OdmResult<()> {
        if let Some(target) = path.and_then(DocPath::parse) {
            self.collection = target.collection;
            self.set(NAME_FIELD, target.name)?;
        }
        let wrapper = Arc::clone(&self.wrapper);
        wrapper.insert(self)
    }

    /// A new, unsaved object of the same type carrying this object's stored
    /// field values except `Id`, optionally addressed at `path`.
    ///
    /// A document already stored at `path` is not adopted: the copy gets
    /// fresh metadata and no identifier, so inserting it adds a document.
    pub fn copy(&self, path: Option<&str>) -> OdmResult<Self> {
        let mut seed = Document::new();
        for name in M::fields().names().filter(|name| *name != ID_FIELD) {
            seed.insert(name.to_string(), self.get(name)?);
        }
        self.wrapper.new_unsaved::<M>(path, seed)
    }
}

impl<M> Object<M> {
    /// Collection the object is stored in.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn meta(&self) -> &MetaData {
        &self.meta
    }

    /// Storage identifier, set by the first insert.
    pub fn id(&self) -> Option<&DocumentId> {
        self.meta.id()
    }

    pub fn wrapper(&self) -> &Arc<PersistenceWrapper> {
        &self.wrapper
    }
}

impl<M: Model> Persistable for Object<M> {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn identifier(&self) -> Option<&DocumentId> {
        self.meta.id()
    }

    fn write_document(&mut self) -> OdmResult<Document> {
        self.serialize(true)
    }

    fn assign_identifier(&mut self, id: DocumentId) -> OdmResult<()> {
        self.meta.assign_id(id.clone())?;
        self.fields.assign(ID_FIELD, id.into())
    }
}

impl<M: Model> fmt::Debug for Object<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("model", &M::TYPE_NAME)
            .field("collection", &self.collection)
            .field("fields", &self.fields)
            .field("meta", &self.meta)
            .finish()
    }
}
