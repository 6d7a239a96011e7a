//! Document database client interface for Fango.
//!
//! The mapping layer never talks to a database engine directly. It goes
//! through the traits in this crate, which mirror the shape of a document
//! database driver: a connector opens clients, a client hands out databases,
//! a database hands out collections.
//!
//! # Backends
//!
//! - [`InMemoryConnector`] -- `HashMap`-based backend for tests and embedding
//!
//! # Rules
//!
//! 1. A lookup miss is `Ok(None)`, never an error.
//! 2. Backend failures are returned as [`StoreError`] and never retried here.
//! 3. Queries are equality matches on top-level keys.

pub mod error;
pub mod key;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use key::{ConnectionKey, DEFAULT_PORT};
pub use memory::{InMemoryClient, InMemoryCollection, InMemoryConnector, InMemoryDatabase};
pub use traits::{Connector, DocumentClient, DocumentCollection, DocumentDatabase, UpdateOutcome};
