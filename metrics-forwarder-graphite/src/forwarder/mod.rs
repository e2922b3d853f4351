use std::{
    io::{self, Write},
    net::{SocketAddr, TcpStream, ToSocketAddrs as _},
    time::Duration,
};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use thiserror::Error;

use crate::settings::Endpoint;

pub mod connection;
pub mod session;
pub mod sync;

/// Errors that could occur while establishing a connection to the remote endpoint.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// No endpoint has been configured, or the configured host is empty.
    #[error("no remote endpoint configured")]
    NotConfigured,

    /// The configured port cannot be connected to.
    #[error("invalid port 0 for host '{host}'")]
    InvalidPort {
        /// Host the port was configured alongside.
        host: String,
    },

    /// The configured host could not be resolved to a socket address.
    #[error("failed to resolve '{host}': {source}")]
    Resolve {
        /// Host that failed to resolve.
        host: String,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },

    /// The configured host resolved, but to no addresses at all.
    #[error("'{host}' resolved to no addresses")]
    NoAddresses {
        /// Host that resolved to nothing.
        host: String,
    },

    /// Creating or configuring the socket failed.
    #[error("failed to create socket: {0}")]
    Socket(#[source] io::Error),

    /// Connecting the socket to the resolved address failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Address the connection was attempted against.
        addr: SocketAddr,
        /// Underlying connect error.
        #[source]
        source: io::Error,
    },
}

/// Socket options applied to every new connection.
#[derive(Clone, Debug)]
pub(crate) struct ConnectionOptions {
    pub keepalive: bool,
    pub connect_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
}

/// Opens streams to a remote endpoint.
///
/// The forwarding session only ever talks to the network through this trait, which keeps the reconnect policy
/// independent of real sockets.
pub trait Connect: Send + 'static {
    /// Stream type produced by a successful connection.
    type Stream: Write + Send;

    /// Opens a new stream to the given endpoint.
    fn connect(&self, endpoint: &Endpoint) -> Result<Self::Stream, ConnectError>;
}

/// Connector producing plain TCP streams.
///
/// Each resolved address of the endpoint is tried in order. Keepalive and timeouts are applied as configured on the
/// builder.
#[derive(Clone, Debug)]
pub struct TcpConnector {
    options: ConnectionOptions,
}

impl TcpConnector {
    pub(crate) fn new(options: ConnectionOptions) -> Self {
        TcpConnector { options }
    }

    fn connect_addr(&self, addr: SocketAddr) -> Result<TcpStream, ConnectError> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(ConnectError::Socket)?;
        if self.options.keepalive {
            socket.set_keepalive(true).map_err(ConnectError::Socket)?;
        }

        let sock_addr = SockAddr::from(addr);
        let result = match self.options.connect_timeout {
            Some(timeout) => socket.connect_timeout(&sock_addr, timeout),
            None => socket.connect(&sock_addr),
        };
        result.map_err(|source| ConnectError::Connect { addr, source })?;

        let stream = TcpStream::from(socket);
        stream.set_write_timeout(self.options.write_timeout).map_err(ConnectError::Socket)?;
        Ok(stream)
    }
}

impl Connect for TcpConnector {
    type Stream = TcpStream;

    fn connect(&self, endpoint: &Endpoint) -> Result<TcpStream, ConnectError> {
        let addrs = (endpoint.host(), endpoint.port())
            .to_socket_addrs()
            .map_err(|source| ConnectError::Resolve { host: endpoint.host().to_string(), source })?;

        // Try every resolved address in turn, reporting the last failure if none of them work.
        let mut last_error = None;
        for addr in addrs {
            match self.connect_addr(addr) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ConnectError::NoAddresses { host: endpoint.host().to_string() }))
    }
}

/// Checks the parts of an endpoint that can be rejected without touching the network.
pub(crate) fn validate_endpoint(endpoint: Option<Endpoint>) -> Result<Endpoint, ConnectError> {
    let endpoint = endpoint.ok_or(ConnectError::NotConfigured)?;
    if endpoint.host().is_empty() {
        return Err(ConnectError::NotConfigured);
    }
    if endpoint.port() == 0 {
        return Err(ConnectError::InvalidPort { host: endpoint.host().to_string() });
    }
    Ok(endpoint)
}
