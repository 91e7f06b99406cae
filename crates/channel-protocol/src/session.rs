//! Session identity, handshake states and channel configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    DEFAULT_MAX_HANDSHAKE_SIZE, DEFAULT_MAX_MESSAGE_SIZE, KeyEncoding, MIN_CIPHERTEXT_SIZE,
    ProtocolError, ProtocolResult,
};

/// Local identifier for one channel, used to correlate log lines.
/// Never sent to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex digits, enough for log correlation
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handshake role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Sends its public key first (the listening side)
    Initiator,
    /// Waits for the peer's public key, then answers (the connecting side)
    Responder,
}

impl Role {
    pub fn sends_first(self) -> bool {
        matches!(self, Self::Initiator)
    }
}

/// Channel state
///
/// ```text
/// Initiator: Init -> KeySent -> KeyReceived -> Established
/// Responder: Init -> KeyReceived -> Established
/// ```
///
/// Any non-terminal state may move to `Failed` or `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelState {
    /// Ephemeral keypair generated, nothing exchanged
    Init,
    /// Our public key has been written to the transport
    KeySent,
    /// Peer public key read and parsed
    KeyReceived,
    /// Symmetric key derived, ready for traffic
    Established,
    /// Handshake or traffic failed, session unusable
    Failed,
    /// Transport closed
    Closed,
}

impl ChannelState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }

    pub fn can_transition_to(self, next: ChannelState) -> bool {
        use ChannelState::*;

        match (self, next) {
            (Init, KeySent) | (Init, KeyReceived) => true,
            (KeySent, KeyReceived) => true,
            (KeyReceived, Established) => true,
            (from, Failed | Closed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Checked transition
    pub fn transition(self, next: ChannelState) -> ProtocolResult<ChannelState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(ProtocolError::InvalidStateTransition {
                from: self,
                to: next,
            })
        }
    }
}

/// Channel configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Public key wire encoding, must match the peer
    pub key_encoding: KeyEncoding,
    /// Receive buffer for the peer's public key
    pub max_handshake_size: usize,
    /// Receive buffer for one application message
    pub max_message_size: usize,
    /// Read timeout in milliseconds (None blocks forever)
    pub read_timeout_ms: Option<u64>,
    /// Write timeout in milliseconds (None blocks forever)
    pub write_timeout_ms: Option<u64>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            key_encoding: KeyEncoding::Sec1,
            max_handshake_size: DEFAULT_MAX_HANDSHAKE_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            read_timeout_ms: None,
            write_timeout_ms: None,
        }
    }
}

impl ChannelConfig {
    /// Parse from JSON, missing fields take defaults
    pub fn from_json(data: &str) -> ProtocolResult<Self> {
        let config: Self = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ProtocolResult<()> {
        let key_len = self.key_encoding.encoded_len();
        if self.max_handshake_size < key_len {
            return Err(ProtocolError::InvalidConfig(format!(
                "max_handshake_size {} cannot hold a {} key of {} bytes",
                self.max_handshake_size, self.key_encoding, key_len
            )));
        }
        if self.max_message_size < MIN_CIPHERTEXT_SIZE {
            return Err(ProtocolError::InvalidConfig(format!(
                "max_message_size {} is below the minimum ciphertext size {}",
                self.max_message_size, MIN_CIPHERTEXT_SIZE
            )));
        }
        if self.read_timeout_ms == Some(0) || self.write_timeout_ms == Some(0) {
            return Err(ProtocolError::InvalidConfig(
                "timeouts must be positive; omit the field to block forever".to_string(),
            ));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }
}
