//! Secure Channel - ECDH handshake and encrypted messaging over a byte stream
//!
//! A [`ChannelHandshake`] exchanges ephemeral P-256 public keys over any
//! [`TransportAdapter`](net_transport::TransportAdapter) and derives a shared
//! AES-256 key; the resulting [`SecureChannel`] encrypts each message with
//! AES-CBC under a fresh IV.
//!
//! Peers are not authenticated and messages carry no MAC. A server handling
//! several peers runs one handshake and one channel per connection.

mod channel;
mod error;
mod handshake;
mod observer;

pub use channel::*;
pub use error::*;
pub use handshake::*;
pub use observer::*;

pub use channel_protocol::{ChannelConfig, ChannelState, DEFAULT_PORT, KeyEncoding, Role, SessionId};
