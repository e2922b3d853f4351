use std::{sync::Arc, thread};

use tracing::trace;

use crate::queue::DispatchQueue;

use super::{session::Session, Connect};

/// Background forwarder.
///
/// The forwarder is the only consumer of the dispatch queue and the only owner of the connection. It runs until the
/// queue is closed, and the connection is closed on the way out regardless of how the loop ends.
pub struct Forwarder<C: Connect> {
    queue: Arc<DispatchQueue>,
    session: Session<C>,
}

impl<C: Connect> Forwarder<C> {
    /// Create a new synchronous `Forwarder`.
    pub(crate) fn new(queue: Arc<DispatchQueue>, session: Session<C>) -> Self {
        Forwarder { queue, session }
    }

    /// Run the forwarder, sending each queued message to the remote endpoint until the queue is closed.
    pub fn run(mut self) {
        // The queue lock is only held inside `pop_blocking`, so producers never wait on network I/O.
        while let Some(message) = self.queue.pop_blocking() {
            let outcome = self.session.handle(&message);
            if self.session.settings().debug() {
                trace!(?outcome, bytes = message.len(), "Handled message.");
            }
        }

        self.session.close();
    }
}

impl<C: Connect> Drop for Forwarder<C> {
    fn drop(&mut self) {
        // Covers the forwarder thread unwinding as well as a normal return from `run`.
        if thread::panicking() {
            // Nothing is left to drain the queue, so stop accepting messages until the client is started again.
            let discarded = self.queue.close();
            self.session.track_discarded(discarded);
        }
        self.session.close();
    }
}
