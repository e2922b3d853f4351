use std::io::{self, Write};

use thiserror::Error;

/// Errors that could occur while writing a message to an open connection.
#[derive(Debug, Error)]
pub enum SendError {
    /// The peer closed or reset the connection.
    #[error("connection closed by peer: {0}")]
    DeadPeer(#[source] io::Error),

    /// Only part of the message was accepted by the socket.
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite {
        /// Number of bytes accepted.
        written: usize,
        /// Length of the message.
        expected: usize,
    },

    /// Any other write error, assumed to leave the connection usable.
    #[error("write failed: {0}")]
    Transient(#[source] io::Error),
}

impl SendError {
    /// Returns `true` if the connection should be replaced before sending again.
    ///
    /// Short writes are included: a partially written line cannot be completed without corrupting the stream, so the
    /// connection is abandoned and the whole message is sent again on a fresh one.
    pub fn requires_reconnect(&self) -> bool {
        matches!(self, SendError::DeadPeer(_) | SendError::ShortWrite { .. })
    }

    fn from_io(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::WriteZero => SendError::DeadPeer(e),
            _ => SendError::Transient(e),
        }
    }
}

/// An open connection to the remote endpoint.
///
/// The underlying stream is closed when the connection is dropped, so the only way to "close" a connection is to let
/// go of it.
pub(crate) struct Connection<S> {
    stream: S,
}

impl<S: Write> Connection<S> {
    pub fn new(stream: S) -> Self {
        Connection { stream }
    }

    /// Writes the message with a single write call.
    ///
    /// No attempt is made to continue a partial write.
    pub fn send(&mut self, buf: &[u8]) -> Result<usize, SendError> {
        match self.stream.write(buf) {
            Ok(0) if !buf.is_empty() => Err(SendError::from_io(io::ErrorKind::WriteZero.into())),
            Ok(n) if n < buf.len() => Err(SendError::ShortWrite { written: n, expected: buf.len() }),
            Ok(n) => Ok(n),
            Err(e) => Err(SendError::from_io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};

    use super::{Connection, SendError};

    struct OneShot(Option<io::Result<usize>>);

    impl Write for OneShot {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            self.0.take().expect("stream written to twice")
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn send_with(result: io::Result<usize>) -> Result<usize, SendError> {
        Connection::new(OneShot(Some(result))).send(b"servers.web01.load 0.5 1700000000\n")
    }

    #[test]
    fn full_write_succeeds() {
        assert_eq!(send_with(Ok(34)).unwrap(), 34);
    }

    #[test]
    fn short_write_requires_reconnect() {
        let err = send_with(Ok(10)).unwrap_err();
        assert!(matches!(err, SendError::ShortWrite { written: 10, expected: 34 }));
        assert!(err.requires_reconnect());
    }

    #[test]
    fn zero_write_is_dead_peer() {
        let err = send_with(Ok(0)).unwrap_err();
        assert!(matches!(err, SendError::DeadPeer(_)));
    }

    #[test]
    fn dead_peer_errors_require_reconnect() {
        for kind in [io::ErrorKind::BrokenPipe, io::ErrorKind::ConnectionReset, io::ErrorKind::ConnectionAborted] {
            let err = send_with(Err(kind.into())).unwrap_err();
            assert!(err.requires_reconnect(), "{:?} should require a reconnect", kind);
        }
    }

    #[test]
    fn transient_errors_keep_connection() {
        for kind in [io::ErrorKind::WouldBlock, io::ErrorKind::TimedOut, io::ErrorKind::Interrupted] {
            let err = send_with(Err(kind.into())).unwrap_err();
            assert!(matches!(err, SendError::Transient(_)));
            assert!(!err.requires_reconnect(), "{:?} should not require a reconnect", kind);
        }
    }
}
