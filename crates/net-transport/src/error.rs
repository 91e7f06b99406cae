//! Transport error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Bind error: {0}")]
    Bind(String),

    #[error("Receive error: {0}")]
    Receive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Timeouts leave the connection intact; the call may be repeated
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed(_))
    }
}

pub type TransportResult<T> = Result<T, TransportError>;
