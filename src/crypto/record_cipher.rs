//! Password-derived record encryption
//!
//! Records are sealed with AES-256-GCM under a key derived from the verified
//! plaintext password:
//!
//! ```text
//! password (plaintext, only at verification time)
//!      │
//!      ▼ HKDF-SHA256(salt = "securestore-records-v1:<chat id>")
//! expand("aes-256-gcm-record-key") → 32-byte record key
//!      │
//!      ▼ seal(random 96-bit nonce)
//! nonce || ciphertext || tag
//! ```
//!
//! The stored fingerprint is a plain SHA-256 of the password and is never used
//! as key material, so the database alone cannot decrypt records.

use crate::chat::ChatId;
use hkdf::Hkdf;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

const RECORD_KEY_INFO: &[u8] = b"aes-256-gcm-record-key";

/// Errors that can occur while sealing or opening records
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),
}

/// Record key for one authorized chat
///
/// Key bytes are zeroized on drop. `Debug` never prints them.
pub struct RecordCipher {
    key: Zeroizing<[u8; 32]>,
}

impl RecordCipher {
    /// Derive the record key from a verified password
    pub fn derive(password: &str, chat: ChatId) -> Result<Self, CryptoError> {
        let salt = format!("securestore-records-v1:{}", chat.0);
        let hkdf = Hkdf::<Sha256>::new(Some(salt.as_bytes()), password.as_bytes());
        let mut key = Zeroizing::new([0u8; 32]);
        hkdf.expand(RECORD_KEY_INFO, &mut key[..])
            .map_err(|e| CryptoError::KeyDerivationFailed(format!("HKDF expand failed: {}", e)))?;
        Ok(Self { key })
    }

    fn aead_key(&self) -> Result<LessSafeKey, String> {
        let unbound = UnboundKey::new(&AES_256_GCM, &self.key[..])
            .map_err(|e| format!("Key creation failed: {}", e))?;
        Ok(LessSafeKey::new(unbound))
    }

    /// Seal a record plaintext
    ///
    /// Returns `nonce || ciphertext || tag`. A fresh random nonce is drawn for
    /// every call.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let key = self.aead_key().map_err(CryptoError::EncryptionFailed)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        SystemRandom::new()
            .fill(&mut nonce_bytes)
            .map_err(|_| CryptoError::EncryptionFailed("RNG failure".to_string()))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut sealed = plaintext.to_vec();
        key.seal_in_place_append_tag(nonce, Aad::empty(), &mut sealed)
            .map_err(|e| CryptoError::EncryptionFailed(format!("Seal failed: {}", e)))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Open a record sealed by [`RecordCipher::encrypt`]
    pub fn decrypt(&self, sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        if sealed.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(CryptoError::DecryptionFailed(
                "Ciphertext too short".to_string(),
            ));
        }

        let key = self.aead_key().map_err(CryptoError::DecryptionFailed)?;
        let (nonce_bytes, body) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| CryptoError::DecryptionFailed("Invalid nonce".to_string()))?;

        let mut buffer = Zeroizing::new(body.to_vec());
        let plaintext = key
            .open_in_place(nonce, Aad::empty(), buffer.as_mut_slice())
            .map_err(|_| CryptoError::DecryptionFailed("Authentication failed".to_string()))?;

        Ok(Zeroizing::new(plaintext.to_vec()))
    }
}

impl fmt::Debug for RecordCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RecordCipher(<key>)")
    }
}
