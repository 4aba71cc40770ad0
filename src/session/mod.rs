//! Session core
//!
//! Per-chat authorization lifecycle, inactivity timeout, record staging and
//! the destructive reset flow. Each chat's `Session` is owned by one actor
//! task (see `store`), so signals and timer expiries for a chat never race.

pub mod browse;
pub mod ledger;
pub mod machine;
pub mod reset;
pub mod staging;
pub mod state;
pub mod store;
pub mod timer;

pub use ledger::HistoryLedger;
pub use machine::SessionMachine;
pub use state::{
    BrowseView, Conversation, ConversationState, PasswordMode, Session, StagedRecord,
};
pub use store::SessionStore;
pub use timer::{TimerExpired, TimerHandle, TimerService};

use crate::chat::InboundMessage;
use std::time::Duration;

/// Session settings, read-only for the core
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Inactivity window before an authorized chat is logged out
    pub inactivity_timeout: Duration,
    /// Delete bot messages on explicit logout
    pub clear_history_on_logout: bool,
    /// Delete bot messages when the inactivity timer fires
    pub clear_history_on_alarm: bool,
    /// Records per browse page (at least 1)
    pub browse_page_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout: Duration::from_secs(30),
            clear_history_on_logout: true,
            clear_history_on_alarm: false,
            browse_page_size: 7,
        }
    }
}

/// Event delivered to a session's actor
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Inbound(InboundMessage),
    /// Inactivity timer fired for the given arm generation
    Expired { generation: u64 },
}
