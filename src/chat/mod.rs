//! Chat integration
//!
//! Transport contract, Telegram binding, reply catalogue and the router that
//! feeds private chats into their sessions.

pub mod messages;
pub mod mock;
pub mod router;
pub mod telegram;
pub mod traits;

pub use mock::MockTransport;
pub use router::Router;
pub use telegram::TelegramTransport;
pub use traits::{
    ChatId, ChatKind, InboundMessage, Keyboard, MessageRef, Transport, TransportError,
    TransportResult,
};
