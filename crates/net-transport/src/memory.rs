//! In-memory transport pair
//!
//! Each `send` becomes one chunk on the peer's queue, so write boundaries
//! survive. A `receive` smaller than the pending chunk returns a prefix and
//! keeps the rest for the next call, the way a stream socket would.

use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use tracing::debug;

use crate::{TransportAdapter, TransportError, TransportResult};

/// One end of a connected in-memory pipe
pub struct MemoryTransport {
    label: String,
    tx: Option<Sender<Bytes>>,
    rx: Option<Receiver<Bytes>>,
    pending: Bytes,
    read_timeout: Option<Duration>,
}

impl MemoryTransport {
    /// Create two connected ends
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = unbounded();
        let (b_tx, a_rx) = unbounded();

        (
            Self::new("memory:a", a_tx, a_rx),
            Self::new("memory:b", b_tx, b_rx),
        )
    }

    fn new(label: &str, tx: Sender<Bytes>, rx: Receiver<Bytes>) -> Self {
        Self {
            label: label.to_string(),
            tx: Some(tx),
            rx: Some(rx),
            pending: Bytes::new(),
            read_timeout: None,
        }
    }

    fn take_pending(&mut self, max_len: usize) -> Bytes {
        let len = max_len.min(self.pending.len());
        self.pending.split_to(len)
    }
}

impl TransportAdapter for MemoryTransport {
    fn send(&mut self, data: &[u8]) -> TransportResult<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| TransportError::ConnectionClosed("local end closed".to_string()))?;

        tx.send(Bytes::copy_from_slice(data))
            .map_err(|_| TransportError::ConnectionClosed("peer closed".to_string()))
    }

    fn receive(&mut self, max_len: usize) -> TransportResult<Bytes> {
        if max_len == 0 {
            return Err(TransportError::Receive("zero-length read buffer".to_string()));
        }

        let rx = self
            .rx
            .as_ref()
            .ok_or_else(|| TransportError::ConnectionClosed("local end closed".to_string()))?;

        if !self.pending.is_empty() {
            return Ok(self.take_pending(max_len));
        }

        let chunk = match self.read_timeout {
            Some(timeout) => rx.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => TransportError::Timeout,
                RecvTimeoutError::Disconnected => {
                    TransportError::ConnectionClosed("peer closed".to_string())
                }
            })?,
            None => rx
                .recv()
                .map_err(|_| TransportError::ConnectionClosed("peer closed".to_string()))?,
        };

        self.pending = chunk;
        Ok(self.take_pending(max_len))
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> TransportResult<()> {
        self.read_timeout = timeout;
        Ok(())
    }

    fn set_write_timeout(&mut self, _timeout: Option<Duration>) -> TransportResult<()> {
        // Unbounded queue, writes never block
        Ok(())
    }

    fn close(&mut self) {
        if self.tx.take().is_some() {
            debug!("Closed {}", self.label);
        }
        self.rx = None;
        self.pending = Bytes::new();
    }

    fn is_open(&self) -> bool {
        self.tx.is_some()
    }

    fn peer_label(&self) -> String {
        self.label.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_boundaries_preserved() {
        let (mut a, mut b) = MemoryTransport::pair();

        a.send(b"first").unwrap();
        a.send(b"second").unwrap();

        assert_eq!(b.receive(4096).unwrap().as_ref(), b"first");
        assert_eq!(b.receive(4096).unwrap().as_ref(), b"second");
    }

    #[test]
    fn test_short_read_keeps_remainder() {
        let (mut a, mut b) = MemoryTransport::pair();

        a.send(b"0123456789").unwrap();
        assert_eq!(b.receive(4).unwrap().as_ref(), b"0123");
        assert_eq!(b.receive(100).unwrap().as_ref(), b"456789");
    }

    #[test]
    fn test_close_propagates() {
        let (mut a, mut b) = MemoryTransport::pair();

        a.close();
        assert!(!a.is_open());
        assert!(matches!(b.receive(16), Err(TransportError::ConnectionClosed(_))));
        assert!(matches!(a.send(b"x"), Err(TransportError::ConnectionClosed(_))));
        assert!(matches!(b.send(b"x"), Err(TransportError::ConnectionClosed(_))));
    }

    #[test]
    fn test_read_timeout() {
        let (_a, mut b) = MemoryTransport::pair();
        b.set_read_timeout(Some(Duration::from_millis(10))).unwrap();

        let err = b.receive(16).unwrap_err();
        assert!(err.is_retryable());
    }
}
