//! Packet definitions for the handshake and data phases
//!
//! Both phases use fixed binary layouts with no envelope and no length
//! prefix; a packet is delimited by the transport call that carries it.

use std::fmt;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::{
    BLOCK_SIZE, IV_SIZE, MIN_CIPHERTEXT_SIZE, PEM_PUBLIC_KEY_SIZE, ProtocolError, ProtocolResult,
    SEC1_PUBLIC_KEY_SIZE,
};

/// How a public key is laid out on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyEncoding {
    /// Uncompressed SEC1 point (65 bytes)
    #[default]
    Sec1,
    /// SubjectPublicKeyInfo PEM text
    Pem,
}

impl KeyEncoding {
    /// Length of a public key produced by this crate in this encoding
    pub fn encoded_len(self) -> usize {
        match self {
            Self::Sec1 => SEC1_PUBLIC_KEY_SIZE,
            Self::Pem => PEM_PUBLIC_KEY_SIZE,
        }
    }
}

impl fmt::Display for KeyEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sec1 => f.write_str("sec1"),
            Self::Pem => f.write_str("pem"),
        }
    }
}

impl std::str::FromStr for KeyEncoding {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sec1" => Ok(Self::Sec1),
            "pem" => Ok(Self::Pem),
            other => Err(ProtocolError::InvalidConfig(format!(
                "unknown key encoding: {other}"
            ))),
        }
    }
}

/// Encoded public key, the only key material placed on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyBytes {
    encoding: KeyEncoding,
    bytes: Bytes,
}

impl PublicKeyBytes {
    pub fn new(encoding: KeyEncoding, bytes: impl Into<Bytes>) -> Self {
        Self {
            encoding,
            bytes: bytes.into(),
        }
    }

    pub fn encoding(&self) -> KeyEncoding {
        self.encoding
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes for transmission
    pub fn to_bytes(&self) -> Bytes {
        self.bytes.clone()
    }
}

/// Application data packet: `IV (16 bytes) || CBC ciphertext`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext {
    iv: [u8; IV_SIZE],
    body: Bytes,
}

impl Ciphertext {
    /// Build from an IV and an already padded and encrypted body
    pub fn new(iv: [u8; IV_SIZE], body: impl Into<Bytes>) -> ProtocolResult<Self> {
        let body = body.into();
        if body.is_empty() || body.len() % BLOCK_SIZE != 0 {
            return Err(ProtocolError::MalformedCiphertext {
                len: IV_SIZE + body.len(),
            });
        }
        Ok(Self { iv, body })
    }

    pub fn iv(&self) -> &[u8; IV_SIZE] {
        &self.iv
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Total length on the wire
    pub fn wire_len(&self) -> usize {
        IV_SIZE + self.body.len()
    }

    /// Serialize to bytes for transmission
    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.wire_len());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.body);
        out.freeze()
    }

    /// Split received bytes into IV and body
    pub fn from_bytes(data: &[u8]) -> ProtocolResult<Self> {
        if data.len() < MIN_CIPHERTEXT_SIZE || data.len() % BLOCK_SIZE != 0 {
            return Err(ProtocolError::MalformedCiphertext { len: data.len() });
        }

        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(&data[..IV_SIZE]);

        Ok(Self {
            iv,
            body: Bytes::copy_from_slice(&data[IV_SIZE..]),
        })
    }

    /// Wire length of the ciphertext for a plaintext of `len` bytes.
    ///
    /// PKCS#7 always adds at least one byte, so a full final block gains a
    /// whole extra block of padding.
    pub fn wire_len_for(len: usize) -> usize {
        IV_SIZE + (len / BLOCK_SIZE + 1) * BLOCK_SIZE
    }
}
