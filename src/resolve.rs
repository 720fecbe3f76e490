use std::net::SocketAddr;

use serde::Serialize;

/// Bind addresses that are only reachable as `localhost`.
const LOOPBACK_HOSTS: &[&str] = &[
    "localhost",
    "127.0.0.1",
    "::1",
    "0000:0000:0000:0000:0000:0000:0000:0001",
];

/// Wildcard bind addresses; a browser cannot dial these directly.
const WILDCARD_HOSTS: &[&str] = &["0.0.0.0", "::", "0000:0000:0000:0000:0000:0000:0000:0000"];

/// The local hostname loopback and wildcard binds normalize to.
pub const LOCAL_HOSTNAME: &str = "localhost";

/// The address a dev server actually bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundAddress {
    pub host: String,
    pub port: u16,
}

impl BoundAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host:port`, `[v6]:port` or a socket address.
    pub fn parse(s: &str) -> Option<Self> {
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Some(addr.into());
        }
        let (host, port) = s.rsplit_once(':')?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return None;
        }
        Some(Self::new(host, port.parse().ok()?))
    }
}

impl From<SocketAddr> for BoundAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

/// Server options that shape the public URL.
#[derive(Debug, Clone, Default)]
pub struct UrlOptions {
    pub https: bool,
    /// Base path, e.g. `/` or `/app/`.
    pub base: String,
    /// Overrides `base`. When it starts with `http` it is used as the whole URL.
    pub open: Option<String>,
}

/// A reachable URL for the dev server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DevServerUrl {
    pub url: String,
    pub hostname: String,
    pub port: u16,
}

/// Map a bind host to the hostname a client should dial.
pub fn resolve_hostname(host: &str) -> String {
    if LOOPBACK_HOSTS.contains(&host) || WILDCARD_HOSTS.contains(&host) {
        LOCAL_HOSTNAME.to_string()
    } else {
        host.to_string()
    }
}

/// Resolve the externally reachable URL of a bound server.
///
/// `None` means the server is not listening yet. That is "not ready", not an
/// error.
pub fn resolve(bound: Option<&BoundAddress>, options: &UrlOptions) -> Option<DevServerUrl> {
    let bound = bound?;
    let hostname = resolve_hostname(&bound.host);
    let protocol = if options.https { "https" } else { "http" };

    let path = match &options.open {
        Some(open) => open.as_str(),
        None if options.base.is_empty() => "/",
        None => options.base.as_str(),
    };

    let url = if path.starts_with("http") {
        path.to_string()
    } else {
        let authority = if hostname.contains(':') {
            format!("[{hostname}]")
        } else {
            hostname.clone()
        };
        let sep = if path.starts_with('/') { "" } else { "/" };
        format!("{protocol}://{authority}:{}{sep}{path}", bound.port)
    };

    Some(DevServerUrl {
        url,
        hostname,
        port: bound.port,
    })
}
