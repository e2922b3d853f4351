use std::time::Duration;

use thiserror::Error;

use crate::{
    client::{BlockingClient, GraphiteClient},
    forwarder::{Connect, ConnectionOptions, TcpConnector},
    settings::{Endpoint, Settings},
};

/// Errors that could occur while building a Graphite client.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Failed to parse the remote address.
    #[error("invalid remote address: {reason}")]
    InvalidRemoteAddress {
        /// Details about the parsing failure.
        reason: String,
    },
}

/// Builder for a Graphite client.
pub struct GraphiteBuilder {
    endpoint: Option<Endpoint>,
    keepalive: bool,
    connect_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    debug: bool,
    telemetry: bool,
}

impl GraphiteBuilder {
    /// Set the remote endpoint to forward metric lines to.
    ///
    /// The endpoint is neither validated nor resolved here. An empty host or a port of zero will cause every
    /// connection attempt to fail.
    ///
    /// Defaults to no endpoint, which drops every message until one is configured on the client.
    #[must_use]
    pub fn with_endpoint<H>(mut self, host: H, port: u16) -> Self
    where
        H: Into<String>,
    {
        self.endpoint = Some(Endpoint::new(host, port));
        self
    }

    /// Set the remote endpoint from an address in the format of `<host>:<port>`.
    ///
    /// IPv6 literals must be enclosed in brackets, e.g. `[::1]:2003`.
    ///
    /// # Errors
    ///
    /// If the given address is not able to be parsed as a host and port, an error will be returned indicating the
    /// reason.
    pub fn with_remote_address<A>(mut self, addr: A) -> Result<Self, BuildError>
    where
        A: AsRef<str>,
    {
        self.endpoint = Some(Endpoint::try_from(addr.as_ref())?);
        Ok(self)
    }

    /// Sets whether or not to enable TCP keepalive on new connections.
    ///
    /// Defaults to `true`.
    #[must_use]
    pub fn with_keepalive(mut self, keepalive: bool) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Set the timeout for establishing a connection.
    ///
    /// Defaults to `None`, which leaves it up to the operating system.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the write timeout for forwarding metric lines.
    ///
    /// When the write timeout is reached, the message being sent at the time is dropped without retrying, and the
    /// connection is kept.
    ///
    /// Defaults to `None`, which leaves it up to the operating system.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Sets whether or not to emit diagnostic events about connection and send failures.
    ///
    /// Can be changed later on the client itself.
    ///
    /// Defaults to `false`.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets whether or not to enable telemetry for the client.
    ///
    /// When enabled, counters describing the client's own behavior (messages sent, resent and dropped, bytes sent,
    /// connection attempts and failures, reconnects) are registered with the recorder that is active when the client
    /// is started.
    ///
    /// Defaults to `false`.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: bool) -> Self {
        self.telemetry = telemetry;
        self
    }

    fn connector(&self) -> TcpConnector {
        TcpConnector::new(ConnectionOptions {
            keepalive: self.keepalive,
            connect_timeout: self.connect_timeout,
            write_timeout: self.write_timeout,
        })
    }

    /// Builds the client.
    ///
    /// The client is returned stopped: call [`GraphiteClient::start`] to spawn the background forwarder.
    pub fn build(self) -> GraphiteClient {
        let connector = self.connector();
        self.build_with_connector(connector)
    }

    /// Builds the client around a custom connector.
    ///
    /// Keepalive and timeout settings are the connector's own responsibility in this case.
    pub fn build_with_connector<C>(self, connector: C) -> GraphiteClient<C>
    where
        C: Connect + Clone,
    {
        GraphiteClient::new(connector, Settings::new(self.endpoint, self.debug), self.telemetry)
    }

    /// Builds a client that sends on the calling thread.
    ///
    /// Telemetry is not collected for blocking clients.
    pub fn build_blocking(self) -> BlockingClient {
        let connector = self.connector();
        BlockingClient::new(connector, Settings::new(self.endpoint, self.debug))
    }
}

impl Default for GraphiteBuilder {
    fn default() -> Self {
        GraphiteBuilder {
            endpoint: None,
            keepalive: true,
            connect_timeout: None,
            write_timeout: None,
            debug: false,
            telemetry: false,
        }
    }
}
