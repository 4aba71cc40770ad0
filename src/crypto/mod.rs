/// Cryptographic primitives for SecureStore
///
/// This module implements:
/// - Password fingerprinting and the minimum-strength predicate
/// - Password-derived record keys and AES-256-GCM record sealing
pub mod fingerprint;
pub mod record_cipher;

pub use fingerprint::{fingerprint, is_password_weak, Fingerprint};
pub use record_cipher::{CryptoError, RecordCipher};
