//! In-memory account store for testing
//!
//! Mirrors the SQLite engine's semantics (lowest row wins, auto-created
//! accounts) and adds hooks for duplicate rows and outages.

use super::{AccountStore, CreateOutcome, RecordId, RecordOverview, StoreError, StoreResult};
use crate::chat::ChatId;
use crate::crypto::Fingerprint;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::warn;

#[derive(Clone, Default)]
pub struct MemoryAccountStore {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    accounts: Vec<AccountRow>,
    records: Vec<RecordRow>,
    next_row_id: i64,
    unavailable: bool,
    fail_record_writes: bool,
}

struct AccountRow {
    id: i64,
    chat: ChatId,
    fingerprint: Option<String>,
}

struct RecordRow {
    id: RecordId,
    account_id: i64,
    created_at: i64,
    ciphertext: Vec<u8>,
    size: u64,
}

impl MemoryState {
    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }

    fn next_id(&mut self) -> i64 {
        self.next_row_id += 1;
        self.next_row_id
    }

    fn account_id(&self, chat: ChatId) -> Option<i64> {
        let mut ids = self.accounts.iter().filter(|a| a.chat == chat).map(|a| a.id);
        let first = ids.next()?;
        let duplicates = ids.count();
        if duplicates > 0 {
            warn!(chat_id = %chat, duplicates, "Duplicate account rows, using the oldest");
        }
        Some(first)
    }

    fn insert_account(&mut self, chat: ChatId, fingerprint: Option<String>) -> i64 {
        let id = self.next_id();
        self.accounts.push(AccountRow { id, chat, fingerprint });
        id
    }

    fn account_id_or_create(&mut self, chat: ChatId) -> i64 {
        match self.account_id(chat) {
            Some(id) => id,
            None => {
                warn!(chat_id = %chat, "Account not found, creating one without password");
                self.insert_account(chat, None)
            }
        }
    }
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an extra account row for the chat, as left by old databases
    pub fn insert_duplicate_account(&self, chat: ChatId, fingerprint: Option<&Fingerprint>) -> i64 {
        self.state
            .lock()
            .unwrap()
            .insert_account(chat, fingerprint.map(|f| f.as_str().to_string()))
    }

    /// Attach a record to a specific account row
    pub fn insert_record_for_account(&self, account_id: i64, ciphertext: &[u8]) -> RecordId {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.records.push(RecordRow {
            id,
            account_id,
            created_at: 0,
            ciphertext: ciphertext.to_vec(),
            size: ciphertext.len() as u64,
        });
        id
    }

    /// Make every operation fail with `StoreError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    /// Make only `create_record` fail
    pub fn set_fail_record_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_record_writes = fail;
    }

    /// Number of account rows for the chat
    pub fn account_count(&self, chat: ChatId) -> usize {
        self.state
            .lock()
            .unwrap()
            .accounts
            .iter()
            .filter(|a| a.chat == chat)
            .count()
    }

    /// Stored ciphertexts for the chat, oldest first
    pub fn stored_ciphertexts(&self, chat: ChatId) -> Vec<Vec<u8>> {
        let state = self.state.lock().unwrap();
        let ids: Vec<i64> = state
            .accounts
            .iter()
            .filter(|a| a.chat == chat)
            .map(|a| a.id)
            .collect();
        state
            .records
            .iter()
            .filter(|r| ids.contains(&r.account_id))
            .map(|r| r.ciphertext.clone())
            .collect()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn create_if_absent(&self, chat: ChatId) -> StoreResult<CreateOutcome> {
        let mut state = self.state.lock().unwrap();
        state.check_available()?;
        if state.account_id(chat).is_some() {
            return Ok(CreateOutcome::Exists);
        }
        state.insert_account(chat, None);
        Ok(CreateOutcome::Created)
    }

    async fn password_fingerprint(&self, chat: ChatId) -> StoreResult<Option<Fingerprint>> {
        let state = self.state.lock().unwrap();
        state.check_available()?;
        let Some(id) = state.account_id(chat) else {
            return Ok(None);
        };
        Ok(state
            .accounts
            .iter()
            .find(|a| a.id == id)
            .and_then(|a| a.fingerprint.clone())
            .and_then(Fingerprint::from_stored))
    }

    async fn set_password_fingerprint(&self, chat: ChatId, fingerprint: &Fingerprint) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        state.check_available()?;
        let value = fingerprint.as_str().to_string();
        match state.account_id(chat) {
            Some(id) => {
                if let Some(row) = state.accounts.iter_mut().find(|a| a.id == id) {
                    row.fingerprint = Some(value);
                }
            }
            None => {
                state.insert_account(chat, Some(value));
            }
        }
        Ok(())
    }

    async fn create_record(&self, chat: ChatId, ciphertext: &[u8], size: u64) -> StoreResult<RecordId> {
        let mut state = self.state.lock().unwrap();
        state.check_available()?;
        if state.fail_record_writes {
            return Err(StoreError::Database("record write rejected".to_string()));
        }

        let account_id = state.account_id_or_create(chat);
        let id = state.next_id();
        state.records.push(RecordRow {
            id,
            account_id,
            created_at: chrono::Utc::now().timestamp(),
            ciphertext: ciphertext.to_vec(),
            size,
        });
        Ok(id)
    }

    async fn records_overview(&self, chat: ChatId) -> StoreResult<Vec<RecordOverview>> {
        let mut state = self.state.lock().unwrap();
        state.check_available()?;
        state.account_id_or_create(chat);
        let owned: Vec<i64> = state
            .accounts
            .iter()
            .filter(|a| a.chat == chat)
            .map(|a| a.id)
            .collect();
        Ok(state
            .records
            .iter()
            .filter(|r| owned.contains(&r.account_id))
            .map(|r| RecordOverview {
                id: r.id,
                created_at: r.created_at,
                size: r.size,
            })
            .collect())
    }

    async fn record_ciphertext(&self, chat: ChatId, record: RecordId) -> StoreResult<Option<Vec<u8>>> {
        let state = self.state.lock().unwrap();
        state.check_available()?;
        let owned: Vec<i64> = state
            .accounts
            .iter()
            .filter(|a| a.chat == chat)
            .map(|a| a.id)
            .collect();
        Ok(state
            .records
            .iter()
            .find(|r| r.id == record && owned.contains(&r.account_id))
            .map(|r| r.ciphertext.clone()))
    }

    async fn delete_account_and_records(&self, chat: ChatId) -> StoreResult<(u64, u64)> {
        let mut state = self.state.lock().unwrap();
        state.check_available()?;

        let owned: Vec<i64> = state
            .accounts
            .iter()
            .filter(|a| a.chat == chat)
            .map(|a| a.id)
            .collect();
        if owned.is_empty() {
            warn!(chat_id = %chat, "Account not found, nothing deleted");
            return Ok((0, 0));
        }

        let records_before = state.records.len();
        state.records.retain(|r| !owned.contains(&r.account_id));
        let records = records_before - state.records.len();
        state.accounts.retain(|a| a.chat != chat);

        Ok((owned.len() as u64, records as u64))
    }
}
