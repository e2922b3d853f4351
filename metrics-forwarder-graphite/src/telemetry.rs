use metrics::{counter, Counter};

use crate::forwarder::session::Outcome;

/// Forwarder telemetry.
///
/// `Telemetry` collects information about the forwarder's behavior and reports it as normal metrics through whichever
/// recorder is active when the forwarder is started.
#[derive(Clone)]
pub struct Telemetry {
    messages_sent: Counter,
    messages_resent: Counter,
    messages_dropped: Counter,
    bytes_sent: Counter,
    connects: Counter,
    connect_failures: Counter,
    reconnects: Counter,
}

impl Telemetry {
    /// Creates a `Telemetry` instance, registering its counters with the current recorder.
    pub fn new(transport: &'static str) -> Self {
        let labels = telemetry_tags!("client_transport" => transport);

        Self {
            messages_sent: counter!("graphite.client.messages_sent", labels.iter()),
            messages_resent: counter!("graphite.client.messages_resent", labels.iter()),
            messages_dropped: counter!("graphite.client.messages_dropped", labels.iter()),
            bytes_sent: counter!("graphite.client.bytes_sent", labels.iter()),
            connects: counter!("graphite.client.connects", labels.iter()),
            connect_failures: counter!("graphite.client.connect_failures", labels.iter()),
            reconnects: counter!("graphite.client.reconnects", labels.iter()),
        }
    }

    /// Tracks the outcome of handling a single message.
    pub fn track_outcome(&self, outcome: Outcome, bytes_len: usize) {
        match outcome {
            Outcome::Sent => {
                self.messages_sent.increment(1);
                self.bytes_sent.increment(bytes_len as u64);
            }
            Outcome::Resent => {
                self.messages_sent.increment(1);
                self.messages_resent.increment(1);
                self.bytes_sent.increment(bytes_len as u64);
            }
            Outcome::Dropped => self.messages_dropped.increment(1),
        }
    }

    /// Tracks messages discarded without a send attempt.
    pub fn track_discarded(&self, count: usize) {
        self.messages_dropped.increment(count as u64);
    }

    /// Tracks a successful connection.
    pub fn track_connect(&self) {
        self.connects.increment(1);
    }

    /// Tracks a failed connection attempt.
    pub fn track_connect_failure(&self) {
        self.connect_failures.increment(1);
    }

    /// Tracks a connection being replaced after the peer went away.
    pub fn track_reconnect(&self) {
        self.reconnects.increment(1);
    }
}

macro_rules! _telemetry_tags {
    ($($k:literal => $v:expr),*) => {
        [
            ::metrics::Label::from_static_parts("client", "rust"),
            ::metrics::Label::from_static_parts("client_version", env!("CARGO_PKG_VERSION")),
            $(::metrics::Label::from_static_parts($k, $v),)*
        ]
    };
}

pub(crate) use _telemetry_tags as telemetry_tags;
