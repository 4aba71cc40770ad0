//! SQLite account store
//!
//! Schema (created on open):
//!
//! ```text
//! accounts(id INTEGER PK, chat_id INTEGER UNIQUE, password_fingerprint TEXT)
//! records(id INTEGER PK, account_id -> accounts.id, created_at INTEGER,
//!         ciphertext BLOB, size INTEGER)
//! ```
//!
//! Databases created by older releases may lack the UNIQUE constraint, so
//! every lookup still handles several rows for one chat.

use super::{AccountStore, CreateOutcome, RecordId, RecordOverview, StoreError, StoreResult};
use crate::chat::ChatId;
use crate::crypto::Fingerprint;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::{debug, warn};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS accounts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        chat_id INTEGER NOT NULL UNIQUE,
        password_fingerprint TEXT
    )",
    "CREATE TABLE IF NOT EXISTS records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        account_id INTEGER NOT NULL REFERENCES accounts(id),
        created_at INTEGER NOT NULL,
        ciphertext BLOB NOT NULL,
        size INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS records_account_idx ON records(account_id)",
];

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// SQLite-backed account store
#[derive(Debug, Clone)]
pub struct SqliteAccountStore {
    pool: SqlitePool,
}

impl SqliteAccountStore {
    /// Open (or create) the database file and apply the schema
    pub async fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database (single connection so all queries share it)
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Total `(accounts, records)` across all chats
    pub async fn totals(&self) -> StoreResult<(u64, u64)> {
        let accounts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.pool)
            .await?;
        let records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records")
            .fetch_one(&self.pool)
            .await?;
        Ok((to_u64(accounts), to_u64(records)))
    }

    /// Row ids of the chat's accounts, lowest first
    async fn account_ids(&self, chat: ChatId) -> StoreResult<Vec<i64>> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM accounts WHERE chat_id = ? ORDER BY id")
                .bind(chat.0)
                .fetch_all(&self.pool)
                .await?;

        if ids.len() > 1 {
            warn!(
                chat_id = %chat,
                duplicates = ids.len() - 1,
                "Duplicate account rows, using the oldest"
            );
        }
        Ok(ids)
    }

    async fn insert_account(&self, chat: ChatId, fingerprint: Option<&str>) -> StoreResult<i64> {
        let result = sqlx::query("INSERT INTO accounts (chat_id, password_fingerprint) VALUES (?, ?)")
            .bind(chat.0)
            .bind(fingerprint)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Account row for the chat, creating one if missing (logged)
    async fn account_id_or_create(&self, chat: ChatId) -> StoreResult<i64> {
        match self.account_ids(chat).await?.first() {
            Some(id) => Ok(*id),
            None => {
                warn!(chat_id = %chat, "Account not found, creating one without password");
                self.insert_account(chat, None).await
            }
        }
    }
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn create_if_absent(&self, chat: ChatId) -> StoreResult<CreateOutcome> {
        if !self.account_ids(chat).await?.is_empty() {
            return Ok(CreateOutcome::Exists);
        }
        self.insert_account(chat, None).await?;
        debug!(chat_id = %chat, "Account created");
        Ok(CreateOutcome::Created)
    }

    async fn password_fingerprint(&self, chat: ChatId) -> StoreResult<Option<Fingerprint>> {
        let Some(id) = self.account_ids(chat).await?.first().copied() else {
            return Ok(None);
        };

        let stored: Option<String> =
            sqlx::query_scalar("SELECT password_fingerprint FROM accounts WHERE id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(stored.and_then(Fingerprint::from_stored))
    }

    async fn set_password_fingerprint(&self, chat: ChatId, fingerprint: &Fingerprint) -> StoreResult<()> {
        match self.account_ids(chat).await?.first() {
            Some(id) => {
                sqlx::query("UPDATE accounts SET password_fingerprint = ? WHERE id = ?")
                    .bind(fingerprint.as_str())
                    .bind(*id)
                    .execute(&self.pool)
                    .await?;
            }
            None => {
                self.insert_account(chat, Some(fingerprint.as_str())).await?;
            }
        }
        Ok(())
    }

    async fn create_record(&self, chat: ChatId, ciphertext: &[u8], size: u64) -> StoreResult<RecordId> {
        let account_id = self.account_id_or_create(chat).await?;
        let result = sqlx::query(
            "INSERT INTO records (account_id, created_at, ciphertext, size) VALUES (?, ?, ?, ?)",
        )
        .bind(account_id)
        .bind(chrono::Utc::now().timestamp())
        .bind(ciphertext)
        .bind(i64::try_from(size).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn records_overview(&self, chat: ChatId) -> StoreResult<Vec<RecordOverview>> {
        self.account_id_or_create(chat).await?;
        // Duplicate rows included, matching what a wipe deletes
        let rows: Vec<(i64, i64, i64)> = sqlx::query_as(
            "SELECT id, created_at, size FROM records
             WHERE account_id IN (SELECT id FROM accounts WHERE chat_id = ?)
             ORDER BY id",
        )
        .bind(chat.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, created_at, size)| RecordOverview {
                id,
                created_at,
                size: to_u64(size),
            })
            .collect())
    }

    async fn record_ciphertext(&self, chat: ChatId, record: RecordId) -> StoreResult<Option<Vec<u8>>> {
        let ciphertext: Option<Vec<u8>> = sqlx::query_scalar(
            "SELECT ciphertext FROM records
             WHERE id = ? AND account_id IN (SELECT id FROM accounts WHERE chat_id = ?)",
        )
        .bind(record)
        .bind(chat.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ciphertext)
    }

    async fn delete_account_and_records(&self, chat: ChatId) -> StoreResult<(u64, u64)> {
        let mut tx = self.pool.begin().await?;

        let records = sqlx::query(
            "DELETE FROM records WHERE account_id IN (SELECT id FROM accounts WHERE chat_id = ?)",
        )
        .bind(chat.0)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let accounts = sqlx::query("DELETE FROM accounts WHERE chat_id = ?")
            .bind(chat.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if accounts == 0 {
            warn!(chat_id = %chat, "Account not found, nothing deleted");
        } else if accounts > 1 {
            warn!(chat_id = %chat, accounts, "Deleted duplicate account rows");
        }
        Ok((accounts, records))
    }
}
