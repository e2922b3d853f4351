use std::{
    fmt,
    sync::atomic::{AtomicBool, Ordering},
};

use parking_lot::Mutex;

use crate::builder::BuildError;

/// Remote endpoint that metric lines are forwarded to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Creates a new `Endpoint` from a host and port.
    ///
    /// No validation or resolution happens here: an empty host or a zero port is only rejected when a connection is
    /// actually attempted.
    pub fn new<H>(host: H, port: u16) -> Self
    where
        H: Into<String>,
    {
        Endpoint { host: host.into(), port }
    }

    /// Returns the host portion of the endpoint.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port portion of the endpoint.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl<'a> TryFrom<&'a str> for Endpoint {
    type Error = BuildError;

    fn try_from(addr: &'a str) -> Result<Self, Self::Error> {
        let invalid = |reason: String| BuildError::InvalidRemoteAddress { reason };

        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| invalid(format!("missing port in '{}'", addr)))?;

        // Bracketed IPv6 literals, e.g. `[::1]:2003`.
        let host = match host.strip_prefix('[') {
            Some(inner) => inner
                .strip_suffix(']')
                .ok_or_else(|| invalid(format!("unterminated IPv6 literal in '{}'", addr)))?,
            None if host.contains(':') => {
                return Err(invalid(format!("IPv6 literal must be bracketed in '{}'", addr)))
            }
            None => host,
        };

        if host.is_empty() {
            return Err(invalid(format!("missing host in '{}'", addr)));
        }

        let port = port.parse::<u16>().map_err(|e| invalid(format!("invalid port '{}': {}", port, e)))?;

        Ok(Endpoint::new(host, port))
    }
}

/// Settings shared between the caller-facing handle and the forwarding session.
///
/// The endpoint is only ever read as a whole, cloned snapshot so that a connection attempt never sees a host from one
/// `configure` call paired with the port of another.
pub(crate) struct Settings {
    endpoint: Mutex<Option<Endpoint>>,
    debug: AtomicBool,
}

impl Settings {
    pub fn new(endpoint: Option<Endpoint>, debug: bool) -> Self {
        Settings { endpoint: Mutex::new(endpoint), debug: AtomicBool::new(debug) }
    }

    /// Replaces the endpoint used by the next connection attempt.
    pub fn configure(&self, endpoint: Endpoint) {
        *self.endpoint.lock() = Some(endpoint);
    }

    /// Returns a snapshot of the currently configured endpoint.
    pub fn endpoint(&self) -> Option<Endpoint> {
        self.endpoint.lock().clone()
    }

    pub fn set_debug(&self, enabled: bool) {
        self.debug.store(enabled, Ordering::Relaxed);
    }

    /// Returns `true` if diagnostic events should be emitted.
    pub fn debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }
}
