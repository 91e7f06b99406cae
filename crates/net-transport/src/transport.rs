//! Transport abstraction consumed by the channel

use std::time::Duration;

use bytes::Bytes;

use crate::TransportResult;

/// Blocking byte-stream transport.
///
/// Implementations provide no message boundaries beyond what a single
/// `send`/`receive` pair delivers.
pub trait TransportAdapter: Send {
    /// Write all of `data` as one transport write
    fn send(&mut self, data: &[u8]) -> TransportResult<()>;

    /// Read at most `max_len` bytes from one transport read.
    ///
    /// Blocks until data arrives, the read timeout expires
    /// (`TransportError::Timeout`) or the peer closes
    /// (`TransportError::ConnectionClosed`).
    fn receive(&mut self, max_len: usize) -> TransportResult<Bytes>;

    /// `None` blocks forever
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> TransportResult<()>;

    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> TransportResult<()>;

    /// Close the connection. Subsequent calls fail with `ConnectionClosed`.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Peer description for logs
    fn peer_label(&self) -> String;
}

impl<T: TransportAdapter + ?Sized> TransportAdapter for Box<T> {
    fn send(&mut self, data: &[u8]) -> TransportResult<()> {
        (**self).send(data)
    }

    fn receive(&mut self, max_len: usize) -> TransportResult<Bytes> {
        (**self).receive(max_len)
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> TransportResult<()> {
        (**self).set_read_timeout(timeout)
    }

    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> TransportResult<()> {
        (**self).set_write_timeout(timeout)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn peer_label(&self) -> String {
        (**self).peer_label()
    }
}
