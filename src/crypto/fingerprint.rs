//! Password fingerprinting and strength classification
//!
//! A fingerprint is the hex-encoded SHA-256 digest of the submitted password.
//! It is what the account store keeps and what verification compares; the
//! plaintext is never stored or logged.
//!
//! ## Strength Predicate
//!
//! A password is weak unless it starts with at least 8 characters drawn from
//! `A-Z a-z 0-9 @#$%^&+=`. Characters after that prefix are not checked, so
//! `Passw0rd!` is strong while `abc` and `pass word` are weak.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::LazyLock;

static STRONG_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9@#$%^&+=]{8,}").expect("strength pattern is a valid regex")
});

/// Hex-encoded SHA-256 digest of a password
///
/// `Debug` is redacted so fingerprints never end up in logs by accident.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap a fingerprint loaded from storage
    ///
    /// Returns `None` for an empty value: accounts created before a password
    /// was set carry an empty fingerprint column.
    pub fn from_stored(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Fingerprint(<redacted>)")
    }
}

/// Compute the fingerprint of a submitted password
pub fn fingerprint(password: &str) -> Fingerprint {
    let digest = Sha256::digest(password.as_bytes());
    Fingerprint(hex::encode(digest))
}

/// Check the minimum-strength predicate (see module docs)
pub fn is_password_weak(password: &str) -> bool {
    !STRONG_PREFIX.is_match(password)
}
