use std::{io, sync::Arc, thread::JoinHandle};

use bytes::Bytes;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, Dispatch};

use crate::{
    forwarder::{
        session::{Outcome, Session},
        sync::Forwarder,
        Connect, TcpConnector,
    },
    queue::DispatchQueue,
    settings::{Endpoint, Settings},
    telemetry::Telemetry,
};

const FORWARDER_THREAD_NAME: &str = "metrics-forwarder-graphite";

/// Errors that could occur while starting a [`GraphiteClient`].
#[derive(Debug, Error)]
pub enum StartError {
    /// Failed to spawn the background forwarder thread.
    #[error("failed to spawn background thread for forwarder: {0}")]
    Backend(#[source] io::Error),
}

struct Worker {
    handle: JoinHandle<()>,
    telemetry: Option<Telemetry>,
}

/// Client that forwards metric lines to a remote endpoint from a background thread.
///
/// Messages handed to [`send`][GraphiteClient::send] are queued and written to the remote endpoint, in order, by a
/// single forwarder thread that owns the connection. Delivery is best-effort: messages sent while the client is
/// stopped are discarded, and a message is dropped if it cannot be written after at most one reconnect.
///
/// All methods take `&self`, so a client can be shared between threads with an [`Arc`]. Dropping the client stops it.
pub struct GraphiteClient<C: Connect + Clone = TcpConnector> {
    connector: C,
    settings: Arc<Settings>,
    queue: Arc<DispatchQueue>,
    telemetry: bool,
    worker: Mutex<Option<Worker>>,
}

impl<C: Connect + Clone> GraphiteClient<C> {
    pub(crate) fn new(connector: C, settings: Settings, telemetry: bool) -> Self {
        GraphiteClient {
            connector,
            settings: Arc::new(settings),
            queue: Arc::new(DispatchQueue::new()),
            telemetry,
            worker: Mutex::new(None),
        }
    }

    /// Sets the remote endpoint.
    ///
    /// Takes effect on the next connection attempt: an already open connection is left alone. The endpoint is not
    /// validated or resolved until then.
    pub fn configure<H>(&self, host: H, port: u16)
    where
        H: Into<String>,
    {
        self.settings.configure(Endpoint::new(host, port));
    }

    /// Returns the currently configured remote endpoint, if any.
    pub fn endpoint(&self) -> Option<Endpoint> {
        self.settings.endpoint()
    }

    /// Enables or disables diagnostic events about connection and send failures.
    ///
    /// This never changes how messages are delivered.
    pub fn set_debug(&self, enabled: bool) {
        self.settings.set_debug(enabled);
    }

    /// Returns `true` if the forwarder is running.
    pub fn is_running(&self) -> bool {
        self.queue.is_running()
    }

    /// Starts the background forwarder.
    ///
    /// Does nothing if the forwarder is already running. A forwarder thread that has died is reaped and replaced. The
    /// `tracing` dispatcher and, if telemetry is enabled, the
    /// `metrics` recorder active on the calling thread are the ones the forwarder reports to.
    ///
    /// # Errors
    ///
    /// If the forwarder thread cannot be spawned, an error is returned and the client remains stopped.
    pub fn start(&self) -> Result<(), StartError> {
        let mut worker = self.worker.lock();
        if worker.is_some() && self.queue.is_running() {
            return Ok(());
        }

        // The queue is only closed with a worker in place if the forwarder thread panicked.
        if let Some(Worker { handle, .. }) = worker.take() {
            reap(handle);
        }

        let telemetry = self.telemetry.then(|| Telemetry::new("tcp"));
        let session = Session::new(self.connector.clone(), Arc::clone(&self.settings), telemetry.clone());
        let forwarder = Forwarder::new(Arc::clone(&self.queue), session);
        let dispatch = tracing::dispatcher::get_default(Dispatch::clone);

        self.queue.open();
        let spawned = std::thread::Builder::new()
            .name(FORWARDER_THREAD_NAME.to_string())
            .spawn(move || tracing::dispatcher::with_default(&dispatch, || forwarder.run()));

        match spawned {
            Ok(handle) => {
                *worker = Some(Worker { handle, telemetry });
                Ok(())
            }
            Err(e) => {
                self.queue.close();
                Err(StartError::Backend(e))
            }
        }
    }

    /// Stops the background forwarder.
    ///
    /// Does nothing if the forwarder is not running. Otherwise, waits for the forwarder thread to finish the message
    /// it is currently handling, if any, and exit. The connection is closed by the time this returns. Messages still
    /// waiting in the queue are discarded.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        let Some(Worker { handle, telemetry }) = worker.take() else {
            return;
        };

        let discarded = self.queue.close();
        reap(handle);

        if discarded > 0 {
            if self.settings.debug() {
                debug!(discarded, "Discarded queued messages on stop.");
            }
            if let Some(telemetry) = telemetry {
                telemetry.track_discarded(discarded);
            }
        }
    }

    /// Queues a message to be sent to the remote endpoint.
    ///
    /// The message is sent as-is, so it should already be a complete line, including the trailing newline. This never
    /// blocks on the network and never fails: if the client is not running, the message is silently discarded.
    pub fn send<M>(&self, message: M)
    where
        M: Into<Bytes>,
    {
        self.queue.push(message.into());
    }
}

fn reap(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        error!("Forwarder thread panicked.");
    }
}

impl<C: Connect + Clone> Drop for GraphiteClient<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Client that sends metric lines on the calling thread.
///
/// Applies the same delivery policy as [`GraphiteClient`] (lazy connect, one reconnect and resend when the peer has
/// gone away) but performs all I/O inline and reports what happened to each message.
pub struct BlockingClient<C: Connect = TcpConnector> {
    session: Session<C>,
}

impl<C: Connect> BlockingClient<C> {
    pub(crate) fn new(connector: C, settings: Settings) -> Self {
        BlockingClient { session: Session::new(connector, Arc::new(settings), None) }
    }

    /// Sets the remote endpoint, taking effect on the next connection attempt.
    pub fn configure<H>(&mut self, host: H, port: u16)
    where
        H: Into<String>,
    {
        self.session.settings().configure(Endpoint::new(host, port));
    }

    /// Enables or disables diagnostic events about connection and send failures.
    pub fn set_debug(&mut self, enabled: bool) {
        self.session.settings().set_debug(enabled);
    }

    /// Returns `true` if a connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Sends a message, connecting first if necessary.
    pub fn send(&mut self, message: &[u8]) -> Outcome {
        self.session.handle(message)
    }

    /// Closes the current connection, if any. The next send reconnects.
    pub fn close(&mut self) {
        self.session.close();
    }
}
