//! Ephemeral P-256 key agreement

use std::fmt;

use channel_protocol::{KeyEncoding, PublicKeyBytes, SEC1_PUBLIC_KEY_SIZE};
use p256::{
    PublicKey,
    ecdh::EphemeralSecret,
    elliptic_curve::sec1::ToEncodedPoint,
    pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding},
};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use tracing::debug;
use zeroize::Zeroizing;

use crate::{CryptoError, CryptoResult, SYMMETRIC_KEY_SIZE};

/// Session key derived from the ECDH shared secret. Zeroized on drop.
#[derive(Clone)]
pub struct SymmetricKey(Zeroizing<[u8; SYMMETRIC_KEY_SIZE]>);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; SYMMETRIC_KEY_SIZE]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_SIZE] {
        &self.0
    }

    /// Short non-secret identifier for logs
    pub fn fingerprint(&self) -> String {
        fingerprint(self.0.as_slice())
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice() == other.0.as_slice()
    }
}

impl Eq for SymmetricKey {}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymmetricKey({})", self.fingerprint())
    }
}

/// Key pair for ephemeral key exchange
pub struct KeyPair {
    secret: EphemeralSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a new ephemeral key pair on P-256
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random(&mut OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Encode our public key for the wire
    pub fn public_bytes(&self, encoding: KeyEncoding) -> CryptoResult<PublicKeyBytes> {
        encode_public_key(&self.public, encoding)
    }

    /// Decode the peer key, run ECDH and hash the result into a session key.
    ///
    /// The secret stays in the key pair, which is dropped with the session.
    pub fn compute_shared_secret(&self, peer_public: &PublicKeyBytes) -> CryptoResult<SymmetricKey> {
        let peer = parse_public_key(peer_public)?;
        let shared = self.secret.diffie_hellman(&peer);
        let key = derive_symmetric_key(shared.raw_secret_bytes());

        debug!(
            peer = %fingerprint(peer_public.as_bytes()),
            key = %key.fingerprint(),
            "Derived session key"
        );

        Ok(key)
    }
}

/// Encode a public key in the given wire encoding
pub fn encode_public_key(public: &PublicKey, encoding: KeyEncoding) -> CryptoResult<PublicKeyBytes> {
    match encoding {
        KeyEncoding::Sec1 => {
            let point = public.to_encoded_point(false);
            Ok(PublicKeyBytes::new(encoding, point.as_bytes().to_vec()))
        }
        KeyEncoding::Pem => {
            let pem = public
                .to_public_key_pem(LineEnding::LF)
                .map_err(|e| CryptoError::Encoding(e.to_string()))?;
            Ok(PublicKeyBytes::new(encoding, pem.into_bytes()))
        }
    }
}

/// Decode peer public key bytes into a curve point
pub fn parse_public_key(bytes: &PublicKeyBytes) -> CryptoResult<PublicKey> {
    match bytes.encoding() {
        KeyEncoding::Sec1 => {
            if bytes.len() != SEC1_PUBLIC_KEY_SIZE {
                return Err(CryptoError::Decode(format!(
                    "expected {} byte uncompressed point, got {} bytes",
                    SEC1_PUBLIC_KEY_SIZE,
                    bytes.len()
                )));
            }
            PublicKey::from_sec1_bytes(bytes.as_bytes())
                .map_err(|_| CryptoError::Decode("point is not on P-256".to_string()))
        }
        KeyEncoding::Pem => {
            let text = std::str::from_utf8(bytes.as_bytes())
                .map_err(|e| CryptoError::Decode(format!("PEM is not UTF-8: {e}")))?;
            PublicKey::from_public_key_pem(text).map_err(|e| CryptoError::Decode(e.to_string()))
        }
    }
}

/// SHA-256 of the raw shared secret.
///
/// A plain hash with no salt or context; both peers get the same key from
/// the same secret and nothing else.
pub fn derive_symmetric_key(shared_secret: &[u8]) -> SymmetricKey {
    let digest = Sha256::digest(shared_secret);
    let mut key = Zeroizing::new([0u8; SYMMETRIC_KEY_SIZE]);
    key.copy_from_slice(&digest);
    SymmetricKey(key)
}

/// First four bytes of SHA-256 as hex
pub fn fingerprint(data: &[u8]) -> String {
    Sha256::digest(data)[..4]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_key_agreement() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();

        let alice_public = alice.public_bytes(KeyEncoding::Sec1).unwrap();
        let bob_public = bob.public_bytes(KeyEncoding::Sec1).unwrap();

        let alice_key = alice.compute_shared_secret(&bob_public).unwrap();
        let bob_key = bob.compute_shared_secret(&alice_public).unwrap();

        assert_eq!(alice_key, bob_key);
        assert_eq!(alice_key.as_bytes().len(), 32);
    }

    #[test]
    fn test_pem_agreement() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();

        let alice_public = alice.public_bytes(KeyEncoding::Pem).unwrap();
        let bob_public = bob.public_bytes(KeyEncoding::Pem).unwrap();

        assert!(alice_public.as_bytes().starts_with(b"-----BEGIN PUBLIC KEY-----"));
        assert_eq!(alice_public.len(), KeyEncoding::Pem.encoded_len());

        let alice_key = alice.compute_shared_secret(&bob_public).unwrap();
        let bob_key = bob.compute_shared_secret(&alice_public).unwrap();
        assert_eq!(alice_key, bob_key);
    }

    #[test]
    fn test_public_bytes_round_trip() {
        let pair = KeyPair::generate();

        for encoding in [KeyEncoding::Sec1, KeyEncoding::Pem] {
            let encoded = pair.public_bytes(encoding).unwrap();
            let parsed = parse_public_key(&encoded).unwrap();
            assert_eq!(&parsed, pair.public_key());

            // Deterministic
            assert_eq!(encoded, pair.public_bytes(encoding).unwrap());
        }

        let sec1 = pair.public_bytes(KeyEncoding::Sec1).unwrap();
        assert_eq!(sec1.len(), SEC1_PUBLIC_KEY_SIZE);
        assert_eq!(sec1.as_bytes()[0], 0x04);
    }

    #[test]
    fn test_decode_rejects_truncated() {
        let pair = KeyPair::generate();
        let encoded = pair.public_bytes(KeyEncoding::Sec1).unwrap();
        let truncated = PublicKeyBytes::new(KeyEncoding::Sec1, encoded.as_bytes()[..40].to_vec());

        assert!(matches!(
            pair.compute_shared_secret(&truncated),
            Err(CryptoError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_off_curve_point() {
        let pair = KeyPair::generate();
        let mut bytes = pair.public_bytes(KeyEncoding::Sec1).unwrap().as_bytes().to_vec();
        // Perturb y so the point leaves the curve
        bytes[64] ^= 0x01;
        let bad = PublicKeyBytes::new(KeyEncoding::Sec1, bytes);

        assert!(matches!(
            pair.compute_shared_secret(&bad),
            Err(CryptoError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_bad_tag_and_garbage_pem() {
        let pair = KeyPair::generate();
        let mut bytes = pair.public_bytes(KeyEncoding::Sec1).unwrap().as_bytes().to_vec();
        bytes[0] = 0x07;
        let bad_tag = PublicKeyBytes::new(KeyEncoding::Sec1, bytes);
        assert!(matches!(parse_public_key(&bad_tag), Err(CryptoError::Decode(_))));

        let garbage = PublicKeyBytes::new(KeyEncoding::Pem, b"-----BEGIN PUBLIC KEY-----\nAAAA\n".to_vec());
        assert!(matches!(parse_public_key(&garbage), Err(CryptoError::Decode(_))));

        let not_utf8 = PublicKeyBytes::new(KeyEncoding::Pem, vec![0xff, 0xfe, 0x00]);
        assert!(matches!(parse_public_key(&not_utf8), Err(CryptoError::Decode(_))));
    }

    #[test]
    fn test_encoding_mismatch_is_decode_error() {
        let pair = KeyPair::generate();
        let pem = pair.public_bytes(KeyEncoding::Pem).unwrap();
        let misread = PublicKeyBytes::new(KeyEncoding::Sec1, pem.to_bytes());

        assert!(matches!(
            pair.compute_shared_secret(&misread),
            Err(CryptoError::Decode(_))
        ));
    }

    #[test]
    fn test_derivation_is_plain_sha256() {
        let secret = [0x42u8; 32];
        let key = derive_symmetric_key(&secret);
        let expected = Sha256::digest(secret);
        assert_eq!(key.as_bytes().as_slice(), expected.as_slice());
        assert_eq!(key, derive_symmetric_key(&secret));
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let key = SymmetricKey::from_bytes([0xabu8; 32]);
        let rendered = format!("{key:?}");
        assert!(!rendered.contains(&"ab".repeat(32)));
        assert!(rendered.starts_with("SymmetricKey("));
    }
}
