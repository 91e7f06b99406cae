//! Crypto Session - ECDH key agreement and block encryption for the channel
//!
//! Provides P-256 ephemeral key agreement with a SHA-256 derived key and
//! AES-256-CBC (PKCS#7, random IV) symmetric encryption.
//!
//! Known weaknesses kept on purpose:
//! - the symmetric key is a bare hash of the shared secret, not a KDF with
//!   context or domain separation;
//! - ciphertexts carry no MAC, so padding failures are observable and
//!   tampering can go undetected.

mod cipher;
mod error;
mod key_agreement;

pub use cipher::*;
pub use error::*;
pub use key_agreement::*;

pub use channel_protocol::{IV_SIZE, SYMMETRIC_KEY_SIZE};
