//! Fango: path-addressed object-document mapping.
//!
//! Objects are documents addressed by a `collection/name` path. Their
//! attributes are *fields*: memoized computations that can be overridden by
//! assignment. Stored fields are serialized into the persisted document;
//! computed-only fields stay in memory.
//! Database handles come from a [`ConnectionRegistry`] that shares one
//! client per connection key and one wrapper per database.
//!
//! # Modules
//!
//! - [`field`] — Field declarations, arguments, and memoization
//! - [`model`] — The [`Model`] trait naming a type's fields
//! - [`object`] — [`Object`]: construction, field access, serialization
//! - [`wrapper`] — [`PersistenceWrapper`]: create, insert, and find
//! - [`registry`] — [`ConnectionRegistry`] and scoped [`Connection`]s
//! - [`config`] — [`ConnectionConfig`] and connection defaults
//!
//! # Example
//!
//! ```
//! use std::sync::OnceLock;
//!
//! use fango::{ConnectionConfig, Document, FieldArgs, FieldSet, Model, Object, OdmResult};
//! use serde_json::{json, Value};
//!
//! struct Report;
//!
//! fn rows(_: &Object<Report>, _: &FieldArgs) -> OdmResult<Value> {
//!     Ok(json!([]))
//! }
//!
//! impl Model for Report {
//!     const TYPE_NAME: &'static str = "Report";
//!
//!     fn fields() -> &'static FieldSet<Self> {
//!         static FIELDS: OnceLock<FieldSet<Report>> = OnceLock::new();
//!         FIELDS.get_or_init(|| FieldSet::builder().field("Rows", rows).build())
//!     }
//! }
//!
//! let db = fango::connect(&ConnectionConfig::new().with_dbname("docs")).unwrap();
//! let mut report: Object<Report> = db.new_object(Some("reports/weekly"), Document::new()).unwrap();
//! report.set("Rows", json!([1, 2, 3])).unwrap();
//! report.insert(None).unwrap();
//!
//! let again: Object<Report> = db.new_object(Some("reports/weekly"), Document::new()).unwrap();
//! assert_eq!(again.get("Rows").unwrap(), json!([1, 2, 3]));
//! assert_eq!(again.id(), report.id());
//! ```

pub mod config;
pub mod error;
pub mod field;
pub mod model;
pub mod object;
pub mod registry;
pub mod wrapper;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConnectionConfig, WrapperKey, DEFAULT_DB, DEFAULT_HOST, DEFAULT_HOST_URL, DEFAULT_PORT};
pub use error::{OdmError, OdmResult};
pub use field::{Field, FieldArgs, FieldFn, FieldSet, FieldSetBuilder, ID_FIELD, NAME_FIELD};
pub use model::Model;
pub use object::Object;
pub use registry::{connect, Connection, ConnectionRegistry};
pub use wrapper::{Persistable, PersistenceWrapper};

// Re-export the types callers need to build kwargs and read metadata.
pub use fango_store::{ConnectionKey, Connector, InMemoryConnector};
pub use fango_types::{normalize, split, DocPath, Document, DocumentId, MetaData};
