//! Channel error types

use channel_protocol::{ChannelState, ProtocolError};
use crypto_session::CryptoError;
use net_transport::TransportError;
use thiserror::Error;

/// Error surfaced by the handshake or an established channel
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Decode, padding or malformed-ciphertext failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The peer reads one message per receive of at most `max` bytes
    #[error("Message too large: {size} bytes on the wire (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// A write timed out partway; the stream may hold a partial message
    #[error("Send timed out")]
    SendTimeout,

    #[error("Channel not established (state: {0:?})")]
    NotEstablished(ChannelState),
}

impl ChannelError {
    /// A receive timeout on an established channel can be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_retryable())
    }

    /// The session is unusable after this error
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::MessageTooLarge { .. }) && !self.is_retryable()
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Crypto(CryptoError::Decode(_)))
    }

    pub fn is_padding(&self) -> bool {
        matches!(self, Self::Crypto(CryptoError::Padding))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_closed())
    }
}

pub type ChannelResult<T> = Result<T, ChannelError>;
