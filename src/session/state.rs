//! Per-chat session state
//!
//! Data that only makes sense in one conversation state lives inside that
//! state's variant: the staged ciphertext exists only while confirming a
//! record, the wipe snapshot only while choosing a password action.

use super::ledger::HistoryLedger;
use super::timer::{TimerHandle, TimerService};
use crate::chat::ChatId;
use crate::crypto::{Fingerprint, RecordCipher};
use crate::storage::RecordOverview;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// How the next submitted password is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordMode {
    /// No password on file, two-step creation
    Setting,
    /// Password on file, not authorized
    Verifying,
    Authorized,
}

/// Conversation state without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Start,
    TypingPassword,
    ChoosePasswordAction,
    Idle,
    TypingRecord,
    ConfirmingRecord,
    Browsing,
}

impl ConversationState {
    /// States only reachable while authorized
    pub fn requires_authorization(self) -> bool {
        matches!(
            self,
            ConversationState::Idle
                | ConversationState::TypingRecord
                | ConversationState::ConfirmingRecord
                | ConversationState::Browsing
        )
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConversationState::Start => "start",
            ConversationState::TypingPassword => "typing_password",
            ConversationState::ChoosePasswordAction => "choose_password_action",
            ConversationState::Idle => "idle",
            ConversationState::TypingRecord => "typing_record",
            ConversationState::ConfirmingRecord => "confirming_record",
            ConversationState::Browsing => "browsing",
        };
        f.write_str(name)
    }
}

/// Encrypted record waiting for Save or Cancel
#[derive(Clone, PartialEq, Eq)]
pub struct StagedRecord {
    pub ciphertext: Vec<u8>,
    /// Plaintext length in bytes
    pub size: u64,
}

impl fmt::Debug for StagedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedRecord")
            .field("ciphertext", &format_args!("{} bytes", self.ciphertext.len()))
            .field("size", &self.size)
            .finish()
    }
}

/// Records overview snapshot being paged through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseView {
    pub page: usize,
    pub records: Vec<RecordOverview>,
}

impl BrowseView {
    pub fn new(records: Vec<RecordOverview>) -> Self {
        Self { page: 0, records }
    }

    pub fn page_count(&self, page_size: usize) -> usize {
        self.records.len().div_ceil(page_size.max(1))
    }

    /// `(number, record)` pairs on the current page, numbered from 1
    pub fn page_entries(&self, page_size: usize) -> impl Iterator<Item = (usize, &RecordOverview)> {
        let page_size = page_size.max(1);
        self.records
            .iter()
            .enumerate()
            .skip(self.page * page_size)
            .take(page_size)
            .map(|(index, record)| (index + 1, record))
    }

    pub fn has_prev(&self) -> bool {
        self.page > 0
    }

    pub fn has_next(&self, page_size: usize) -> bool {
        self.page + 1 < self.page_count(page_size)
    }

    pub fn next_page(&mut self, page_size: usize) {
        if self.has_next(page_size) {
            self.page += 1;
        }
    }

    pub fn prev_page(&mut self) {
        self.page = self.page.saturating_sub(1);
    }

    /// Record by its 1-based number
    pub fn record(&self, number: usize) -> Option<&RecordOverview> {
        number.checked_sub(1).and_then(|index| self.records.get(index))
    }
}

/// Conversation state with the data it owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversation {
    Start,
    TypingPassword,
    /// `awaiting_wipe` holds the record count the wipe phrase must name
    ChoosePasswordAction { awaiting_wipe: Option<u64> },
    Idle,
    TypingRecord,
    ConfirmingRecord(StagedRecord),
    Browsing(BrowseView),
}

impl Conversation {
    pub fn state(&self) -> ConversationState {
        match self {
            Conversation::Start => ConversationState::Start,
            Conversation::TypingPassword => ConversationState::TypingPassword,
            Conversation::ChoosePasswordAction { .. } => ConversationState::ChoosePasswordAction,
            Conversation::Idle => ConversationState::Idle,
            Conversation::TypingRecord => ConversationState::TypingRecord,
            Conversation::ConfirmingRecord(_) => ConversationState::ConfirmingRecord,
            Conversation::Browsing(_) => ConversationState::Browsing,
        }
    }
}

/// Mutable per-chat authorization and conversation context
#[derive(Debug)]
pub struct Session {
    pub chat: ChatId,
    pub conversation: Conversation,
    pub password_mode: PasswordMode,
    /// First entry of a password being created
    pub pending_fingerprint: Option<Fingerprint>,
    /// Last authorization or activity; `None` when not authorized
    pub authorized_at: Option<Instant>,
    pub history: HistoryLedger,
    cipher: Option<RecordCipher>,
    timer: Option<TimerHandle>,
}

impl Session {
    pub fn new(chat: ChatId) -> Self {
        Self {
            chat,
            conversation: Conversation::Start,
            password_mode: PasswordMode::Setting,
            pending_fingerprint: None,
            authorized_at: None,
            history: HistoryLedger::new(),
            cipher: None,
            timer: None,
        }
    }

    pub fn state(&self) -> ConversationState {
        self.conversation.state()
    }

    pub fn is_authorized(&self) -> bool {
        self.password_mode == PasswordMode::Authorized
    }

    /// Authorized, but the last activity is older than `timeout`
    pub fn authorization_lapsed(&self, timeout: Duration) -> bool {
        match self.authorized_at {
            Some(at) if self.is_authorized() => at.elapsed() >= timeout,
            _ => false,
        }
    }

    pub fn cipher(&self) -> Option<&RecordCipher> {
        self.cipher.as_ref()
    }

    /// Generation of the armed timer, if any
    pub fn timer_generation(&self) -> Option<u64> {
        self.timer.as_ref().map(TimerHandle::generation)
    }

    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    /// Cancel the prior timer, then arm a new one
    pub fn rearm_timer(&mut self, timers: &TimerService, delay: Duration) {
        self.disarm_timer();
        self.timer = Some(timers.arm(self.chat, delay));
    }

    pub fn disarm_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    /// Enter `Authorized`, keeping the record key and arming the timer
    pub fn authorize(&mut self, cipher: RecordCipher, timers: &TimerService, timeout: Duration) {
        self.password_mode = PasswordMode::Authorized;
        self.pending_fingerprint = None;
        self.cipher = Some(cipher);
        self.authorized_at = Some(Instant::now());
        self.rearm_timer(timers, timeout);
    }

    /// Refresh activity while authorized
    pub fn touch(&mut self, timers: &TimerService, timeout: Duration) {
        if self.is_authorized() {
            self.authorized_at = Some(Instant::now());
            self.rearm_timer(timers, timeout);
        }
    }

    /// Leave `Authorized`: drop the key, disarm the timer, require the password
    pub fn deauthorize(&mut self) {
        self.disarm_timer();
        self.authorized_at = None;
        self.cipher = None;
        if self.password_mode == PasswordMode::Authorized {
            self.password_mode = PasswordMode::Verifying;
        }
    }

    /// Take the staged record, leaving the conversation `Idle`
    pub fn take_staged(&mut self) -> Option<StagedRecord> {
        match std::mem::replace(&mut self.conversation, Conversation::Idle) {
            Conversation::ConfirmingRecord(staged) => Some(staged),
            _ => None,
        }
    }
}
