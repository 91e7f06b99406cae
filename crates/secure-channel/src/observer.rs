//! Handshake and message boundary events

use channel_protocol::{ChannelState, SessionId};
use tracing::{debug, info, warn};

/// Event emitted at handshake and message boundaries.
///
/// Carries sizes and fingerprints only, never key material or plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    StateChanged {
        from: ChannelState,
        to: ChannelState,
    },
    PublicKeySent {
        bytes: usize,
    },
    PublicKeyReceived {
        bytes: usize,
        fingerprint: String,
    },
    Established {
        key_fingerprint: String,
    },
    MessageSent {
        sequence: u64,
        plaintext_len: usize,
        wire_len: usize,
    },
    MessageReceived {
        sequence: u64,
        plaintext_len: usize,
        wire_len: usize,
    },
    /// A receive timed out; the channel is still usable
    Timeout,
    Failed {
        reason: String,
    },
    Closed,
}

/// Receives channel events
pub trait ChannelObserver: Send + Sync {
    fn on_event(&self, session: SessionId, event: &ChannelEvent);
}

/// Forwards events to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ChannelObserver for TracingObserver {
    fn on_event(&self, session: SessionId, event: &ChannelEvent) {
        let session = session.short();

        match event {
            ChannelEvent::StateChanged { from, to } => {
                debug!(%session, "State {:?} -> {:?}", from, to);
            }
            ChannelEvent::PublicKeySent { bytes } => {
                debug!(%session, "Sent public key ({} bytes)", bytes);
            }
            ChannelEvent::PublicKeyReceived { bytes, fingerprint } => {
                debug!(%session, %fingerprint, "Received peer public key ({} bytes)", bytes);
            }
            ChannelEvent::Established { key_fingerprint } => {
                info!(%session, key = %key_fingerprint, "Channel established");
            }
            ChannelEvent::MessageSent {
                sequence,
                plaintext_len,
                wire_len,
            } => {
                debug!(%session, sequence, "Sent message: {} bytes ({} on wire)", plaintext_len, wire_len);
            }
            ChannelEvent::MessageReceived {
                sequence,
                plaintext_len,
                wire_len,
            } => {
                debug!(%session, sequence, "Received message: {} bytes ({} on wire)", plaintext_len, wire_len);
            }
            ChannelEvent::Timeout => {
                debug!(%session, "Receive timed out");
            }
            ChannelEvent::Failed { reason } => {
                warn!(%session, "Channel failed: {}", reason);
            }
            ChannelEvent::Closed => {
                info!(%session, "Channel closed");
            }
        }
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ChannelObserver for NoopObserver {
    fn on_event(&self, _session: SessionId, _event: &ChannelEvent) {}
}
