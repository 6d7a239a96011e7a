//! Computed fields: memoized, overridable attributes.
//!
//! Each model type declares its fields once in a static [`FieldSet`]. A
//! field is either *stored*, written by serialization and imported from
//! construction kwargs, or *computed only*, which caches the same way but
//! never reaches the persisted document. An object keeps two caches per
//! instance:
//!
//! - the *current value* of every field, keyed by name;
//! - results of argument-bearing calls, keyed by field, positional
//!   arguments, and the keyword set.
//!
//! A no-argument read returns the current value, computing and memoizing it
//! on first use. An argument-bearing call is memoized under its own key and
//! also replaces the current value, so the next no-argument read sees the
//! latest computation. Assignment replaces the current value directly.
//! Failed computations are not memoized.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use fango_types::NAME_KEY;
use serde_json::Value;

use crate::error::{OdmError, OdmResult};
use crate::model::{self, Model};
use crate::object::Object;

/// Name of the base field holding the document name.
pub const NAME_FIELD: &str = NAME_KEY;

/// Name of the base field mirroring the storage identifier.
pub const ID_FIELD: &str = "Id";

/// Signature of a field function.
pub type FieldFn<M> = fn(&Object<M>, &FieldArgs) -> OdmResult<Value>;

/// One declared field of a model type.
pub struct Field<M> {
    name: &'static str,
    compute: FieldFn<M>,
    stored: bool,
}

impl<M> Field<M> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the field is part of the persisted document.
    pub fn is_stored(&self) -> bool {
        self.stored
    }

    pub(crate) fn compute(&self, object: &Object<M>, args: &FieldArgs) -> OdmResult<Value> {
        (self.compute)(object, args)
    }
}

impl<M> fmt::Debug for Field<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("stored", &self.stored)
            .finish()
    }
}

/// The declared fields of a model type, in declaration order.
///
/// Every set starts with the stored base fields `Name` and `Id`.
pub struct FieldSet<M> {
    fields: Vec<Field<M>>,
}

impl<M: Model> FieldSet<M> {
    /// Start a field set holding the base fields.
    pub fn builder() -> FieldSetBuilder<M> {
        FieldSetBuilder {
            fields: vec![
                Field {
                    name: NAME_FIELD,
                    compute: model::generated_name::<M>,
                    stored: true,
                },
                Field {
                    name: ID_FIELD,
                    compute: model::storage_id::<M>,
                    stored: true,
                },
            ],
        }
    }
}

impl<M> FieldSet<M> {
    /// Any declared field, stored or not.
    pub fn get(&self, name: &str) -> Option<&Field<M>> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Stored field names, base fields first. Computed-only fields are
    /// left out.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .filter(|field| field.stored)
            .map(|field| field.name)
    }
}

impl<M> fmt::Debug for FieldSet<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.fields).finish()
    }
}

/// Builder for [`FieldSet`].
pub struct FieldSetBuilder<M> {
    fields: Vec<Field<M>>,
}

impl<M> FieldSetBuilder<M> {
    /// Declare a stored field. Declaring an existing name replaces its
    /// function and kind and keeps its position.
    pub fn field(self, name: &'static str, compute: FieldFn<M>) -> Self {
        self.declare(name, compute, true)
    }

    /// Declare a computed-only field: cached like a stored field but never
    /// serialized.
    pub fn computed(self, name: &'static str, compute: FieldFn<M>) -> Self {
        self.declare(name, compute, false)
    }

    fn declare(mut self, name: &'static str, compute: FieldFn<M>, stored: bool) -> Self {
        match self.fields.iter_mut().find(|field| field.name == name) {
            Some(existing) => {
                existing.compute = compute;
                existing.stored = stored;
            }
            None => self.fields.push(Field {
                name,
                compute,
                stored,
            }),
        }
        self
    }

    pub fn build(self) -> FieldSet<M> {
        FieldSet {
            fields: self.fields,
        }
    }
}

/// Extra arguments of a field call.
///
/// Keyword arguments form a set: insertion order does not matter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldArgs {
    positional: Vec<Value>,
    keyword: BTreeMap<String, Value>,
}

impl FieldArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keyword.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    pub(crate) fn call_key(&self, field: &'static str) -> OdmResult<CallKey> {
        let positional = serde_json::to_string(&self.positional)
            .map_err(|e| OdmError::Serialization(e.to_string()))?;
        let keyword = serde_json::to_string(&self.keyword)
            .map_err(|e| OdmError::Serialization(e.to_string()))?;
        Ok(CallKey {
            field,
            positional,
            keyword,
        })
    }
}

/// Memo key of an argument-bearing call.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct CallKey {
    field: &'static str,
    positional: String,
    keyword: String,
}

impl CallKey {
    pub(crate) fn field(&self) -> &'static str {
        self.field
    }
}

#[derive(Debug, Default)]
struct CacheState {
    current: HashMap<String, Value>,
    calls: HashMap<CallKey, Value>,
}

/// Per-instance field caches.
#[derive(Debug, Default)]
pub(crate) struct FieldCache {
    state: Mutex<CacheState>,
}

impl FieldCache {
    fn lock(&self) -> OdmResult<MutexGuard<'_, CacheState>> {
        self.state
            .lock()
            .map_err(|e| OdmError::LockPoisoned(e.to_string()))
    }

    pub(crate) fn current(&self, name: &str) -> OdmResult<Option<Value>> {
        Ok(self.lock()?.current.get(name).cloned())
    }

    pub(crate) fn remember(&self, name: &str, value: Value) -> OdmResult<()> {
        self.lock()?.current.insert(name.to_string(), value);
        Ok(())
    }

    pub(crate) fn call(&self, key: &CallKey) -> OdmResult<Option<Value>> {
        Ok(self.lock()?.calls.get(key).cloned())
    }

    /// Memoize a call result and make it the field's current value.
    pub(crate) fn remember_call(&self, key: CallKey, value: Value) -> OdmResult<()> {
        let mut state = self.lock()?;
        state.current.insert(key.field().to_string(), value.clone());
        state.calls.insert(key, value);
        Ok(())
    }

    pub(crate) fn assign(&mut self, name: &str, value: Value) -> OdmResult<()> {
        let state = self
            .state
            .get_mut()
            .map_err(|e| OdmError::LockPoisoned(e.to_string()))?;
        state.current.insert(name.to_string(), value);
        Ok(())
    }
}
