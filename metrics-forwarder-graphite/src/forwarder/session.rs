use std::sync::Arc;

use tracing::{debug, warn};

use crate::{settings::Settings, telemetry::Telemetry};

use super::{connection::Connection, validate_endpoint, Connect};

/// What happened to a single message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The message was written on the first attempt.
    Sent,

    /// The first write hit a dead connection, and the message was written again on a fresh connection.
    Resent,

    /// The message was not written and will not be retried.
    Dropped,
}

/// Connection state and per-message delivery policy.
///
/// A session holds at most one connection. Each message gets at most one connection attempt if there is no
/// connection, or, if the write fails because the peer has gone away, exactly one reconnect and one resend. Anything
/// beyond that drops the message.
pub(crate) struct Session<C: Connect> {
    connector: C,
    connection: Option<Connection<C::Stream>>,
    settings: Arc<Settings>,
    telemetry: Option<Telemetry>,
}

impl<C: Connect> Session<C> {
    pub fn new(connector: C, settings: Arc<Settings>, telemetry: Option<Telemetry>) -> Self {
        Session { connector, connection: None, settings, telemetry }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Closes the current connection, if any.
    pub fn close(&mut self) {
        if self.connection.take().is_some() && self.settings.debug() {
            debug!("Closed connection to remote endpoint.");
        }
    }

    /// Counts messages that were discarded without ever being handled.
    pub fn track_discarded(&self, count: usize) {
        if let Some(telemetry) = &self.telemetry {
            telemetry.track_discarded(count);
        }
    }

    /// Handles a single message, connecting or reconnecting as needed.
    pub fn handle(&mut self, message: &[u8]) -> Outcome {
        let outcome = self.deliver(message);
        if let Some(telemetry) = &self.telemetry {
            telemetry.track_outcome(outcome, message.len());
        }
        outcome
    }

    fn deliver(&mut self, message: &[u8]) -> Outcome {
        if self.connection.is_none() && !self.connect() {
            return Outcome::Dropped;
        }

        let Some(connection) = self.connection.as_mut() else {
            return Outcome::Dropped;
        };

        match connection.send(message) {
            Ok(_) => Outcome::Sent,
            Err(e) if e.requires_reconnect() => {
                if self.settings.debug() {
                    debug!(error = %e, "Connection lost while sending, reconnecting.");
                }
                self.connection = None;
                if let Some(telemetry) = &self.telemetry {
                    telemetry.track_reconnect();
                }

                if !self.connect() {
                    return Outcome::Dropped;
                }

                self.resend(message)
            }
            Err(e) => {
                if self.settings.debug() {
                    warn!(error = %e, bytes = message.len(), "Failed to send message, dropping it.");
                }
                Outcome::Dropped
            }
        }
    }

    fn resend(&mut self, message: &[u8]) -> Outcome {
        let Some(connection) = self.connection.as_mut() else {
            return Outcome::Dropped;
        };

        match connection.send(message) {
            Ok(_) => Outcome::Resent,
            Err(e) => {
                if self.settings.debug() {
                    warn!(
                        error = %e,
                        bytes = message.len(),
                        "Failed to resend message after reconnecting, dropping it."
                    );
                }
                if e.requires_reconnect() {
                    self.connection = None;
                }
                Outcome::Dropped
            }
        }
    }

    /// Attempts to open a new connection, returning `true` on success.
    fn connect(&mut self) -> bool {
        let result = validate_endpoint(self.settings.endpoint())
            .and_then(|endpoint| self.connector.connect(&endpoint).map(|stream| (endpoint, stream)));

        match result {
            Ok((endpoint, stream)) => {
                if self.settings.debug() {
                    debug!(%endpoint, "Connected to remote endpoint.");
                }
                if let Some(telemetry) = &self.telemetry {
                    telemetry.track_connect();
                }
                self.connection = Some(Connection::new(stream));
                true
            }
            Err(e) => {
                if self.settings.debug() {
                    warn!(error = %e, "Failed to connect to remote endpoint, dropping message.");
                }
                if let Some(telemetry) = &self.telemetry {
                    telemetry.track_connect_failure();
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{io, sync::Arc};

    use super::{Outcome, Session};
    use crate::{
        settings::{Endpoint, Settings},
        test_util::{ScriptedConnector, WriteResult},
    };

    const LINE: &[u8] = b"servers.web01.cpu 12.5 1700000000\n";

    fn session(connector: &ScriptedConnector) -> Session<ScriptedConnector> {
        let settings = Settings::new(Some(Endpoint::new("127.0.0.1", 2003)), true);
        Session::new(connector.clone(), Arc::new(settings), None)
    }

    #[test]
    fn connects_lazily_and_reuses_connection() {
        let connector = ScriptedConnector::default();
        let mut session = session(&connector);
        assert!(!session.is_connected());

        assert_eq!(session.handle(LINE), Outcome::Sent);
        assert_eq!(session.handle(LINE), Outcome::Sent);

        assert!(session.is_connected());
        assert_eq!(connector.connects(), 1);
        assert_eq!(connector.written(), vec![(1, LINE.to_vec()), (1, LINE.to_vec())]);
    }

    #[test]
    fn connect_failure_drops_message_without_retrying() {
        let connector = ScriptedConnector::default();
        connector.refuse_next_connects(1);
        let mut session = session(&connector);

        assert_eq!(session.handle(LINE), Outcome::Dropped);
        assert_eq!(connector.connects(), 1);
        assert!(connector.written().is_empty());

        // The next message gets its own connection attempt.
        assert_eq!(session.handle(LINE), Outcome::Sent);
        assert_eq!(connector.connects(), 2);
    }

    #[test]
    fn missing_endpoint_never_reaches_connector() {
        let connector = ScriptedConnector::default();
        let mut session = Session::new(connector.clone(), Arc::new(Settings::new(None, false)), None);

        assert_eq!(session.handle(LINE), Outcome::Dropped);
        assert_eq!(connector.connects(), 0);

        session.settings().configure(Endpoint::new("127.0.0.1", 0));
        assert_eq!(session.handle(LINE), Outcome::Dropped);
        assert_eq!(connector.connects(), 0);
    }

    #[test]
    fn dead_peer_triggers_single_reconnect_and_resend() {
        let connector = ScriptedConnector::default();
        let mut session = session(&connector);
        assert_eq!(session.handle(b"first 1 1\n"), Outcome::Sent);

        connector.push_write_results([WriteResult::Fail(io::ErrorKind::BrokenPipe)]);
        assert_eq!(session.handle(LINE), Outcome::Resent);

        assert_eq!(connector.connects(), 2);
        assert_eq!(connector.closed(), 1);
        assert_eq!(connector.written(), vec![(1, b"first 1 1\n".to_vec()), (2, LINE.to_vec())]);
    }

    #[test]
    fn failed_resend_drops_without_second_reconnect() {
        let connector = ScriptedConnector::default();
        let mut session = session(&connector);
        assert_eq!(session.handle(LINE), Outcome::Sent);

        connector.push_write_results([
            WriteResult::Fail(io::ErrorKind::ConnectionReset),
            WriteResult::Fail(io::ErrorKind::ConnectionReset),
        ]);
        assert_eq!(session.handle(LINE), Outcome::Dropped);
        assert_eq!(connector.connects(), 2);
        assert!(!session.is_connected());

        // The following message starts over from a fresh connection.
        assert_eq!(session.handle(LINE), Outcome::Sent);
        assert_eq!(connector.connects(), 3);
    }

    #[test]
    fn failed_reconnect_drops_message() {
        let connector = ScriptedConnector::default();
        let mut session = session(&connector);
        assert_eq!(session.handle(LINE), Outcome::Sent);

        connector.push_write_results([WriteResult::Fail(io::ErrorKind::BrokenPipe)]);
        connector.refuse_next_connects(1);
        assert_eq!(session.handle(LINE), Outcome::Dropped);
        assert_eq!(connector.connects(), 2);
        assert!(!session.is_connected());
    }

    #[test]
    fn short_write_is_resent_on_new_connection() {
        let connector = ScriptedConnector::default();
        let mut session = session(&connector);

        connector.push_write_results([WriteResult::Short(4)]);
        assert_eq!(session.handle(LINE), Outcome::Resent);
        assert_eq!(connector.connects(), 2);
        assert_eq!(connector.written(), vec![(2, LINE.to_vec())]);
    }

    #[test]
    fn transient_error_keeps_connection() {
        let connector = ScriptedConnector::default();
        let mut session = session(&connector);

        connector.push_write_results([WriteResult::Fail(io::ErrorKind::WouldBlock)]);
        assert_eq!(session.handle(LINE), Outcome::Dropped);
        assert!(session.is_connected());

        assert_eq!(session.handle(LINE), Outcome::Sent);
        assert_eq!(connector.connects(), 1);
        assert_eq!(connector.written(), vec![(1, LINE.to_vec())]);
    }

    #[test]
    fn endpoint_changes_apply_to_next_connection_only() {
        let connector = ScriptedConnector::default();
        let mut session = session(&connector);
        assert_eq!(session.handle(LINE), Outcome::Sent);

        session.settings().configure(Endpoint::new("127.0.0.2", 2004));
        assert_eq!(session.handle(LINE), Outcome::Sent);
        assert_eq!(connector.connects(), 1);

        session.close();
        assert_eq!(connector.closed(), 1);
        assert_eq!(session.handle(LINE), Outcome::Sent);
        assert_eq!(connector.connects(), 2);
    }
}
