use std::collections::VecDeque;

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};

struct Inner {
    messages: VecDeque<Bytes>,
    running: bool,
}

/// Unbounded FIFO hand-off between any number of producers and a single consumer.
///
/// The queue also carries the running flag: pushes are only accepted while it is set, and clearing it wakes the
/// consumer so that it can exit instead of waiting forever on an empty queue. Both live under the same lock, which
/// means a wake-up can never be lost between the consumer checking the flag and going to sleep.
pub(crate) struct DispatchQueue {
    inner: Mutex<Inner>,
    available: Condvar,
}

impl DispatchQueue {
    pub fn new() -> Self {
        DispatchQueue {
            inner: Mutex::new(Inner { messages: VecDeque::new(), running: false }),
            available: Condvar::new(),
        }
    }

    /// Appends a message to the tail of the queue.
    ///
    /// Never blocks beyond lock acquisition. Returns `false`, dropping the message, if the queue is not running.
    pub fn push(&self, message: Bytes) -> bool {
        {
            let mut inner = self.inner.lock();
            if !inner.running {
                return false;
            }
            inner.messages.push_back(message);
        }

        self.available.notify_one();
        true
    }

    /// Removes and returns the message at the head of the queue, waiting for one if the queue is empty.
    ///
    /// Returns `None` once the queue has been closed.
    pub fn pop_blocking(&self) -> Option<Bytes> {
        let mut inner = self.inner.lock();
        loop {
            if !inner.running {
                return None;
            }

            if let Some(message) = inner.messages.pop_front() {
                return Some(message);
            }

            self.available.wait(&mut inner);
        }
    }

    /// Marks the queue as running so that pushes are accepted.
    pub fn open(&self) {
        self.inner.lock().running = true;
    }

    /// Marks the queue as stopped and wakes the consumer.
    ///
    /// Any messages still pending are discarded, and the number discarded is returned.
    pub fn close(&self) -> usize {
        let discarded = {
            let mut inner = self.inner.lock();
            inner.running = false;
            let discarded = inner.messages.len();
            inner.messages.clear();
            discarded
        };

        self.available.notify_all();
        discarded
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().running
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().messages.len()
    }
}
