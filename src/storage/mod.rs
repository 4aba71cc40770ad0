//! Account Store
//!
//! Persistence contract consumed by the session core: one account per chat
//! (holding the password fingerprint) and any number of encrypted records.
//! The core never sees SQL; `SqliteAccountStore` is the production engine and
//! `MemoryAccountStore` backs the tests.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryAccountStore;
pub use sqlite::SqliteAccountStore;

use crate::chat::ChatId;
use crate::crypto::Fingerprint;
use async_trait::async_trait;

/// Store-assigned record identifier
pub type RecordId = i64;

/// Metadata of a stored record (no ciphertext)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOverview {
    pub id: RecordId,
    /// Unix timestamp (seconds, UTC) of creation
    pub created_at: i64,
    /// Plaintext size in bytes
    pub size: u64,
}

/// Outcome of `create_if_absent`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    Exists,
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Account store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Transient: the backing database could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Account persistence abstraction
///
/// Implementations tolerate duplicate account rows left by older databases:
/// they log a warning and act on the lowest row id.
#[async_trait]
pub trait AccountStore: Send + Sync + 'static {
    /// Create an account without a password if none exists
    async fn create_if_absent(&self, chat: ChatId) -> StoreResult<CreateOutcome>;

    /// Stored fingerprint, `None` if there is no account or no password yet
    async fn password_fingerprint(&self, chat: ChatId) -> StoreResult<Option<Fingerprint>>;

    /// Store (or replace) the fingerprint, creating the account if needed
    async fn set_password_fingerprint(&self, chat: ChatId, fingerprint: &Fingerprint) -> StoreResult<()>;

    /// Persist an encrypted record stamped with the current time
    ///
    /// A missing account is created (without password) and logged.
    async fn create_record(&self, chat: ChatId, ciphertext: &[u8], size: u64) -> StoreResult<RecordId>;

    /// Metadata of every record for the chat, oldest first
    async fn records_overview(&self, chat: ChatId) -> StoreResult<Vec<RecordOverview>>;

    /// Ciphertext of one record, `None` if it does not belong to the chat
    async fn record_ciphertext(&self, chat: ChatId, record: RecordId) -> StoreResult<Option<Vec<u8>>>;

    /// Delete the account and all its records atomically
    ///
    /// Returns `(deleted_accounts, deleted_records)`.
    async fn delete_account_and_records(&self, chat: ChatId) -> StoreResult<(u64, u64)>;
}
