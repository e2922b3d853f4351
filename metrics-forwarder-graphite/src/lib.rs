//! A background forwarder that delivers plaintext metric lines to a [Graphite][graphite]-compatible collector.
//!
//! [graphite]: https://graphite.readthedocs.io/en/latest/feeding-carbon.html#the-plaintext-protocol
//!
//! # Usage
//!
//! The forwarder does not format metrics itself: callers hand it complete lines, including the trailing newline, and
//! it takes care of getting them onto a persistent TCP connection without ever blocking the caller on the network.
//!
//! ```no_run
//! # use metrics_forwarder_graphite::GraphiteBuilder;
//! let client = GraphiteBuilder::default()
//!     .with_remote_address("127.0.0.1:2003")
//!     .expect("failed to parse remote address")
//!     .build();
//!
//! // Spawn the background forwarder. Until this is called, messages are discarded.
//! client.start().expect("failed to start forwarder");
//!
//! client.send("servers.web01.requests 42 1700000000\n");
//!
//! // Wait for the forwarder to exit and close its connection. Anything still queued is discarded.
//! client.stop();
//! ```
//!
//! # Delivery
//!
//! Delivery is best-effort and at-most-once. Messages are written in the order they were queued, each with a single
//! write call, by one forwarder thread that owns the connection:
//!
//! - If there is no connection, one connection attempt is made. If it fails, the message is dropped.
//! - If the write fails because the peer has gone away (connection reset, broken pipe, or a short write), the
//!   connection is replaced once and the message is written once more. If that fails too, the message is dropped.
//! - Any other write failure drops the message but keeps the connection.
//!
//! Nothing is ever reported back to the caller of [`GraphiteClient::send`]. Failures can be surfaced as `tracing`
//! events by enabling debug mode, and counted through the `metrics` facade by enabling telemetry.
//!
//! # Blocking mode
//!
//! [`BlockingClient`] applies the same delivery rules on the calling thread, and reports the [`Outcome`] of each send.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod builder;
pub use self::builder::{BuildError, GraphiteBuilder};

mod client;
pub use self::client::{BlockingClient, GraphiteClient, StartError};

mod forwarder;
pub use self::forwarder::{
    connection::SendError,
    session::Outcome,
    Connect, ConnectError, TcpConnector,
};

mod queue;

mod settings;
pub use self::settings::Endpoint;

mod telemetry;

#[cfg(test)]
mod test_util;
