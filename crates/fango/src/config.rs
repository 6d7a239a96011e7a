//! Connection configuration.
//!
//! A [`ConnectionConfig`] names a database by optional host, port, and
//! database name. Unset values resolve to the defaults below; resolution is
//! a pure function so equal effective settings always produce equal keys.

use fango_store::ConnectionKey;
use serde::{Deserialize, Serialize};

use crate::error::{OdmError, OdmResult};

pub use fango_store::DEFAULT_PORT;

/// Database used when none is configured.
pub const DEFAULT_DB: &str = "test";

/// Host used when only a port is configured.
pub const DEFAULT_HOST: &str = "localhost";

/// Host spec used when neither host nor port is configured.
pub const DEFAULT_HOST_URL: &str = "mongodb://localhost:27017/";

/// Actor recorded in metadata when the environment names nobody.
pub const UNKNOWN_ACTOR: &str = "unknown";

/// Where to connect. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dbname: Option<String>,
}

/// Cache key of a persistence wrapper: one per client and database.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WrapperKey {
    pub connection: ConnectionKey,
    pub dbname: String,
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_dbname(mut self, dbname: impl Into<String>) -> Self {
        self.dbname = Some(dbname.into());
        self
    }

    /// Parse a TOML table with optional `host`, `port`, and `dbname` keys.
    ///
    /// ```
    /// use fango::ConnectionConfig;
    ///
    /// let config = ConnectionConfig::from_toml_str("dbname = \"audit\"\nport = 27018").unwrap();
    /// assert_eq!(config.dbname.as_deref(), Some("audit"));
    /// assert_eq!(config.port, Some(27018));
    /// ```
    pub fn from_toml_str(raw: &str) -> OdmResult<Self> {
        toml::from_str(raw).map_err(|e| OdmError::Config(e.to_string()))
    }

    /// Key of the client connection.
    ///
    /// Without a port the key is host-only and the client applies its
    /// default port; the host then defaults to [`DEFAULT_HOST_URL`]. With a
    /// port, the host defaults to [`DEFAULT_HOST`].
    pub fn connection_key(&self) -> ConnectionKey {
        match self.port {
            Some(port) => ConnectionKey::HostPort(
                self.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port,
            ),
            None => ConnectionKey::Host(
                self.host
                    .clone()
                    .unwrap_or_else(|| DEFAULT_HOST_URL.to_string()),
            ),
        }
    }

    /// Effective database name.
    pub fn dbname(&self) -> &str {
        self.dbname.as_deref().unwrap_or(DEFAULT_DB)
    }

    /// Key of the wrapper cache entry for this configuration.
    pub fn wrapper_key(&self) -> WrapperKey {
        WrapperKey {
            connection: self.connection_key(),
            dbname: self.dbname().to_string(),
        }
    }
}

/// Actor recorded in created/updated metadata: the `USER` or `USERNAME`
/// environment variable, else [`UNKNOWN_ACTOR`].
pub fn default_actor() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|actor| !actor.is_empty())
        .unwrap_or_else(|| UNKNOWN_ACTOR.to_string())
}
