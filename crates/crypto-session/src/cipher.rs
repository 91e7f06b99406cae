//! AES-256-CBC with PKCS#7 padding and a random IV per message

use aes::Aes256;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use channel_protocol::{Ciphertext, IV_SIZE};
use rand::{RngCore, rngs::OsRng};

use crate::{CryptoError, CryptoResult, SymmetricKey};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Block cipher bound to one session key
pub struct SymmetricCipher {
    key: SymmetricKey,
}

impl SymmetricCipher {
    pub fn new(key: SymmetricKey) -> Self {
        Self { key }
    }

    /// Encrypt under a fresh IV drawn from the OS RNG
    ///
    /// Returns: [16-byte IV][padded ciphertext]
    pub fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Ciphertext> {
        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);

        let body = Aes256CbcEnc::new(self.key.as_bytes().into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        Ciphertext::new(iv, body).map_err(|_| CryptoError::MalformedCiphertext {
            len: Ciphertext::wire_len_for(plaintext.len()),
        })
    }

    /// Split off the IV, decrypt and strip padding.
    ///
    /// No integrity check happens here: a modified ciphertext either fails
    /// with [`CryptoError::Padding`] or decrypts to different bytes.
    pub fn decrypt(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        let ciphertext = Ciphertext::from_bytes(data)
            .map_err(|_| CryptoError::MalformedCiphertext { len: data.len() })?;
        self.decrypt_ciphertext(&ciphertext)
    }

    pub fn decrypt_ciphertext(&self, ciphertext: &Ciphertext) -> CryptoResult<Vec<u8>> {
        Aes256CbcDec::new(self.key.as_bytes().into(), ciphertext.iv().into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext.body())
            .map_err(|_| CryptoError::Padding)
    }
}
