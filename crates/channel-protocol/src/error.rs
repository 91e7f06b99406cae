//! Error types for the protocol

use thiserror::Error;

/// Protocol error
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidStateTransition {
        from: crate::ChannelState,
        to: crate::ChannelState,
    },

    #[error("Malformed ciphertext: {len} bytes is not IV plus whole blocks")]
    MalformedCiphertext { len: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

/// Result type alias for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
