//! Shared Protocol Definitions for the secure channel
//!
//! This crate contains the wire types, handshake states and configuration
//! shared by the crypto, transport and channel crates.

mod error;
mod packets;
mod session;

pub use error::*;
pub use packets::*;
pub use session::*;

/// AES block size (128 bits / 16 bytes)
pub const BLOCK_SIZE: usize = 16;

/// CBC initialization vector size, one block
pub const IV_SIZE: usize = BLOCK_SIZE;

/// Symmetric key size (256 bits / 32 bytes)
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// Uncompressed SEC1 P-256 point: 0x04 || X || Y
pub const SEC1_PUBLIC_KEY_SIZE: usize = 65;

/// SPKI PEM encoding of a P-256 public key with LF line endings
pub const PEM_PUBLIC_KEY_SIZE: usize = 178;

/// Smallest well-formed ciphertext: IV plus one padded block
pub const MIN_CIPHERTEXT_SIZE: usize = IV_SIZE + BLOCK_SIZE;

/// Default receive buffer for the public key exchange
pub const DEFAULT_MAX_HANDSHAKE_SIZE: usize = 4096;

/// Default receive buffer for application messages
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 4096;

/// Default TCP port for the peer binary
pub const DEFAULT_PORT: u16 = 6000;
