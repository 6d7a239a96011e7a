use std::fmt;

/// Port a client uses when the connection key does not name one.
pub const DEFAULT_PORT: u16 = 27017;

/// Identity of a client connection.
///
/// `Host` carries a host spec (a bare host or a connection URL) and leaves
/// the port to the client. `HostPort` names both explicitly.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConnectionKey {
    Host(String),
    HostPort(String, u16),
}

impl ConnectionKey {
    /// The port the client ends up using.
    pub fn effective_port(&self) -> u16 {
        match self {
            Self::HostPort(_, port) => *port,
            Self::Host(spec) => host_and_port(spec).1.unwrap_or(DEFAULT_PORT),
        }
    }

    /// Canonical `host:port` address of the server this key reaches.
    pub fn address(&self) -> String {
        match self {
            Self::HostPort(host, port) => format!("{host}:{port}"),
            Self::Host(spec) => {
                let (host, _) = host_and_port(spec);
                format!("{host}:{}", self.effective_port())
            }
        }
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(spec) => write!(f, "{spec}"),
            Self::HostPort(host, port) => write!(f, "{host}:{port}"),
        }
    }
}

/// Split a host spec such as `mongodb://db1:27018/` into `("db1", Some(27018))`.
fn host_and_port(spec: &str) -> (&str, Option<u16>) {
    let bare = spec.split_once("://").map_or(spec, |(_, rest)| rest);
    let bare = bare.split('/').next().unwrap_or(bare);
    match bare.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host, Some(port)),
            Err(_) => (bare, None),
        },
        None => (bare, None),
    }
}
