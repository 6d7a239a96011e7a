//! Foundation types for Fango.
//!
//! This crate provides the addressing and bookkeeping types shared by the
//! storage interface and the object-document mapper. Every other Fango crate
//! depends on `fango-types`.
//!
//! # Key Types
//!
//! - [`DocPath`] — Normalized `collection/name` address of a document
//! - [`Document`] — The JSON object shape that is persisted and loaded
//! - [`DocumentId`] — Storage identifier assigned by the backend on insert
//! - [`MetaData`] — Audit fields plus the optional storage identifier

pub mod document;
pub mod error;
pub mod meta;
pub mod path;

pub use document::{id_query, Document, DocumentId, ID_KEY, NAME_KEY};
pub use error::{TypeError, TypeResult};
pub use meta::MetaData;
pub use path::{normalize, split, DocPath, ROOT_COLLECTION, SCRATCH_PREFIX, SEPARATOR};
