//! Blocking TCP transport

use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info};

use crate::{TransportAdapter, TransportError, TransportResult};

/// Connected TCP stream
pub struct TcpTransport {
    stream: Option<TcpStream>,
    peer: SocketAddr,
}

impl TcpTransport {
    /// Connect to a remote peer
    pub fn connect(addr: SocketAddr, timeout: Option<Duration>) -> TransportResult<Self> {
        info!("Connecting to {}", addr);

        let stream = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        }
        .map_err(|e| TransportError::ConnectionFailed(format!("{addr}: {e}")))?;

        info!("Connected to {}", addr);
        Self::from_stream(stream)
    }

    /// Wrap an accepted stream
    pub fn from_stream(stream: TcpStream) -> TransportResult<Self> {
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream: Some(stream),
            peer,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn stream(&mut self) -> TransportResult<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| TransportError::ConnectionClosed("local end closed".to_string()))
    }
}

fn map_io(e: io::Error) -> TransportError {
    match e.kind() {
        // Platforms report an expired socket timeout as either kind
        ErrorKind::WouldBlock | ErrorKind::TimedOut => TransportError::Timeout,
        ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe
        | ErrorKind::UnexpectedEof => TransportError::ConnectionClosed(e.to_string()),
        _ => TransportError::Io(e),
    }
}

impl TransportAdapter for TcpTransport {
    fn send(&mut self, data: &[u8]) -> TransportResult<()> {
        let stream = self.stream()?;
        stream.write_all(data).map_err(map_io)?;
        stream.flush().map_err(map_io)
    }

    fn receive(&mut self, max_len: usize) -> TransportResult<Bytes> {
        if max_len == 0 {
            return Err(TransportError::Receive("zero-length read buffer".to_string()));
        }

        let mut buf = vec![0u8; max_len];
        let n = loop {
            match self.stream()?.read(&mut buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(map_io(e)),
            }
        };

        if n == 0 {
            return Err(TransportError::ConnectionClosed(format!(
                "{} closed the connection",
                self.peer
            )));
        }

        buf.truncate(n);
        Ok(Bytes::from(buf))
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> TransportResult<()> {
        self.stream()?.set_read_timeout(timeout)?;
        Ok(())
    }

    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> TransportResult<()> {
        self.stream()?.set_write_timeout(timeout)?;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            // Peer may already be gone
            let _ = stream.shutdown(Shutdown::Both);
            debug!("Connection to {} closed", self.peer);
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn peer_label(&self) -> String {
        self.peer.to_string()
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Listening socket handing out one `TcpTransport` per connection
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    pub fn bind(addr: impl ToSocketAddrs) -> TransportResult<Self> {
        let listener = TcpListener::bind(addr).map_err(|e| TransportError::Bind(e.to_string()))?;
        info!("Listening on {}", listener.local_addr()?);
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Block until a peer connects
    pub fn accept(&self) -> TransportResult<TcpTransport> {
        debug!("Waiting for incoming connection...");

        let (stream, addr) = self
            .listener
            .accept()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        info!("Accepted connection from {}", addr);
        TcpTransport::from_stream(stream)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_loopback_exchange() {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").unwrap();
        let addr = acceptor.local_addr().unwrap();

        let server = thread::spawn(move || {
            let mut conn = acceptor.accept().unwrap();
            let data = conn.receive(4096).unwrap();
            conn.send(&data).unwrap();
        });

        let mut client = TcpTransport::connect(addr, Some(Duration::from_secs(5))).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        client.send(b"ping").unwrap();
        assert_eq!(client.receive(4096).unwrap().as_ref(), b"ping");

        server.join().unwrap();

        // Server dropped its end
        assert!(client.receive(4096).unwrap_err().is_closed());
    }

    #[test]
    fn test_read_timeout_is_retryable() {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").unwrap();
        let addr = acceptor.local_addr().unwrap();

        let mut client = TcpTransport::connect(addr, None).unwrap();
        let _server = acceptor.accept().unwrap();

        client.set_read_timeout(Some(Duration::from_millis(20))).unwrap();
        assert!(client.receive(16).unwrap_err().is_retryable());
        assert!(client.is_open());
    }

    #[test]
    fn test_closed_transport_rejects_io() {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").unwrap();
        let addr = acceptor.local_addr().unwrap();

        let mut client = TcpTransport::connect(addr, None).unwrap();
        client.close();

        assert!(client.send(b"x").unwrap_err().is_closed());
        assert!(client.receive(16).unwrap_err().is_closed());
    }

    #[test]
    fn test_connect_refused() {
        let addr = {
            let acceptor = TcpAcceptor::bind("127.0.0.1:0").unwrap();
            acceptor.local_addr().unwrap()
        };

        assert!(matches!(
            TcpTransport::connect(addr, Some(Duration::from_secs(1))),
            Err(TransportError::ConnectionFailed(_))
        ));
    }
}
