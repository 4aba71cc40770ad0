//! Chat Transport Trait Abstractions
//!
//! The session core only talks to the messaging network through `Transport`.
//! `MockTransport` replaces the Telegram binding in tests.

use async_trait::async_trait;
use std::fmt;

/// Opaque external chat identifier (one chat = one principal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a message inside a chat, used for deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef(pub i64);

/// Kind of chat a message came from
///
/// Only private chats are served; the router leaves everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
}

/// Inbound chat message
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub chat: ChatId,
    pub kind: ChatKind,
    pub message: MessageRef,
    /// `None` for non-text content (stickers, photos, ...)
    pub text: Option<String>,
}

impl InboundMessage {
    /// Private text message, the common case in tests
    pub fn private_text(chat: ChatId, message: MessageRef, text: impl Into<String>) -> Self {
        Self {
            chat,
            kind: ChatKind::Private,
            message,
            text: Some(text.into()),
        }
    }
}

/// Reply keyboard attached to an outbound message
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Keyboard {
    /// Leave whatever keyboard the client currently shows
    #[default]
    Unchanged,
    /// Hide the reply keyboard
    Remove,
    /// One-time reply keyboard, rows of button labels
    Buttons(Vec<Vec<String>>),
}

impl Keyboard {
    pub fn buttons(rows: &[&[&str]]) -> Self {
        Keyboard::Buttons(
            rows.iter()
                .map(|row| row.iter().map(|label| label.to_string()).collect())
                .collect(),
        )
    }
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Message not found: {0:?}")]
    MessageNotFound(MessageRef),

    #[error("Invalid message reference: {0:?}")]
    InvalidReference(MessageRef),

    #[error("Chat not reachable: {0}")]
    ChatUnavailable(ChatId),

    #[error("API error: {0}")]
    Api(String),
}

/// Messaging transport abstraction
///
/// Timers are not part of this trait: expiry is delivered to the owning
/// session through `session::timer::TimerService`.
#[async_trait]
pub trait Transport: Clone + Send + Sync + 'static {
    /// Send text with a keyboard; returns a reference usable for deletion
    async fn send(&self, chat: ChatId, text: &str, keyboard: Keyboard) -> TransportResult<MessageRef>;

    /// Delete a message (best-effort, callers may ignore failures)
    async fn delete(&self, chat: ChatId, message: MessageRef) -> TransportResult<()>;

    /// Leave a non-private chat
    async fn leave(&self, chat: ChatId) -> TransportResult<()>;
}
