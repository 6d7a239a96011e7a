//! Process-wide cache of client and wrapper handles.
//!
//! Connections are long-lived: a registry opens at most one client per
//! [`ConnectionKey`] and one wrapper per key and database, and never closes
//! either. Each cache's check-then-create step runs under its own mutex.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, Mutex, OnceLock};

use fango_store::{ConnectionKey, Connector, DocumentClient, InMemoryConnector};
use tracing::{debug, info};

use crate::config::{default_actor, ConnectionConfig, WrapperKey};
use crate::error::{OdmError, OdmResult};
use crate::wrapper::PersistenceWrapper;

static GLOBAL: OnceLock<ConnectionRegistry> = OnceLock::new();

/// Cache of clients keyed by connection key, and of wrappers keyed by
/// connection key and database name.
pub struct ConnectionRegistry {
    connector: Arc<dyn Connector>,
    actor: String,
    clients: Mutex<HashMap<ConnectionKey, Arc<dyn DocumentClient>>>,
    wrappers: Mutex<HashMap<WrapperKey, Arc<PersistenceWrapper>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry opening clients through `connector`.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            actor: default_actor(),
            clients: Mutex::new(HashMap::new()),
            wrappers: Mutex::new(HashMap::new()),
        }
    }

    /// Record `actor` instead of the environment's user in object metadata.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    /// The process-wide registry, created on first use over the in-memory
    /// backend. It is never reset.
    pub fn global() -> &'static ConnectionRegistry {
        GLOBAL.get_or_init(|| ConnectionRegistry::new(Arc::new(InMemoryConnector::new())))
    }

    /// Wrapper for `config`, opening a client and wrapper on first use.
    ///
    /// Configurations with equal effective host, port, and database always
    /// yield the same `Arc`.
    pub fn wrapper(&self, config: &ConnectionConfig) -> OdmResult<Arc<PersistenceWrapper>> {
        let key = config.wrapper_key();
        let mut wrappers = self
            .wrappers
            .lock()
            .map_err(|e| OdmError::LockPoisoned(e.to_string()))?;
        if let Some(wrapper) = wrappers.get(&key) {
            debug!(connection = %key.connection, dbname = %key.dbname, "reusing cached wrapper");
            return Ok(Arc::clone(wrapper));
        }

        let client = self.client(&key.connection)?;
        let wrapper = Arc::new(PersistenceWrapper::new(client, &key.dbname, &self.actor));
        debug!(connection = %key.connection, dbname = %key.dbname, "created wrapper");
        wrappers.insert(key, Arc::clone(&wrapper));
        Ok(wrapper)
    }

    fn client(&self, key: &ConnectionKey) -> OdmResult<Arc<dyn DocumentClient>> {
        let mut clients = self
            .clients
            .lock()
            .map_err(|e| OdmError::LockPoisoned(e.to_string()))?;
        if let Some(client) = clients.get(key) {
            return Ok(Arc::clone(client));
        }
        let client = self.connector.connect(key)?;
        info!(%key, port = key.effective_port(), "opened database client");
        clients.insert(key.clone(), Arc::clone(&client));
        Ok(client)
    }

    /// Scoped access to the wrapper for `config`. Dropping the returned
    /// [`Connection`] leaves the client open.
    pub fn connect(&self, config: &ConnectionConfig) -> OdmResult<Connection> {
        Ok(Connection {
            wrapper: self.wrapper(config)?,
        })
    }

    /// Run `f` with the wrapper for `config`.
    pub fn with_connection<T, F>(&self, config: &ConnectionConfig, f: F) -> OdmResult<T>
    where
        F: FnOnce(&Arc<PersistenceWrapper>) -> OdmResult<T>,
    {
        let connection = self.connect(config)?;
        f(connection.wrapper())
    }

    /// Number of cached clients.
    pub fn client_count(&self) -> OdmResult<usize> {
        self.clients
            .lock()
            .map(|clients| clients.len())
            .map_err(|e| OdmError::LockPoisoned(e.to_string()))
    }

    /// Number of cached wrappers.
    pub fn wrapper_count(&self) -> OdmResult<usize> {
        self.wrappers
            .lock()
            .map(|wrappers| wrappers.len())
            .map_err(|e| OdmError::LockPoisoned(e.to_string()))
    }
}

/// Connect through the process-wide registry.
pub fn connect(config: &ConnectionConfig) -> OdmResult<Connection> {
    ConnectionRegistry::global().connect(config)
}

/// A wrapper acquired from a registry for the duration of a scope.
///
/// Dereferences to the shared wrapper. Dropping it releases nothing: the
/// wrapper and its client stay cached.
pub struct Connection {
    wrapper: Arc<PersistenceWrapper>,
}

impl Connection {
    pub fn wrapper(&self) -> &Arc<PersistenceWrapper> {
        &self.wrapper
    }
}

impl Deref for Connection {
    type Target = Arc<PersistenceWrapper>;

    fn deref(&self) -> &Self::Target {
        &self.wrapper
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        debug!(dbname = self.wrapper.dbname(), "connection scope ended; client kept open");
    }
}
