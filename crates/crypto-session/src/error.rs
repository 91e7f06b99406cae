//! Crypto session error types

use thiserror::Error;

/// Cryptographic operation error
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Peer public key bytes are not a valid point in the expected encoding
    #[error("Public key decode failed: {0}")]
    Decode(String),

    #[error("Public key encoding failed: {0}")]
    Encoding(String),

    /// PKCS#7 padding invalid after CBC decryption.
    ///
    /// Without a MAC this cannot tell corruption from tampering.
    #[error("Decryption failed: invalid padding")]
    Padding,

    #[error("Malformed ciphertext: {len} bytes")]
    MalformedCiphertext { len: usize },
}

pub type CryptoResult<T> = Result<T, CryptoError>;
