//! Telegram transport
//!
//! Thin `teloxide` binding for the `Transport` trait. Inbound updates are
//! received by a teloxide dispatcher running in a background task and pushed
//! onto an mpsc channel that the router consumes.

use super::traits::{
    ChatId, ChatKind, InboundMessage, Keyboard, MessageRef, Transport, TransportError,
    TransportResult,
};
use async_trait::async_trait;
use teloxide::dispatching::{Dispatcher, UpdateFilterExt};
use teloxide::payloads::SendMessageSetters;
use teloxide::requests::Requester;
use teloxide::types as tg;
use teloxide::{respond, Bot, RequestError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Inbound queue depth between the dispatcher and the router
const INBOUND_BUFFER: usize = 256;

/// Telegram Bot API transport
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(token: &str) -> Self {
        Self {
            bot: Bot::new(token),
        }
    }

    /// Start long polling in a background task
    ///
    /// Returns the inbound message receiver and the dispatcher task. The
    /// dispatcher stops on Ctrl-C, which closes the receiver.
    pub fn spawn_dispatcher(&self) -> (mpsc::Receiver<InboundMessage>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(INBOUND_BUFFER);

        let handler = tg::Update::filter_message().endpoint(move |msg: tg::Message| {
            let tx = tx.clone();
            async move {
                if tx.send(to_inbound(&msg)).await.is_err() {
                    warn!("Router is gone, dropping inbound message");
                }
                respond(())
            }
        });

        let bot = self.bot.clone();
        let task = tokio::spawn(async move {
            info!("Starting Telegram dispatcher");
            Dispatcher::builder(bot, handler)
                .enable_ctrlc_handler()
                .build()
                .dispatch()
                .await;
            info!("Telegram dispatcher stopped");
        });

        (rx, task)
    }
}

fn to_inbound(msg: &tg::Message) -> InboundMessage {
    InboundMessage {
        chat: ChatId(msg.chat.id.0),
        kind: if msg.chat.is_private() {
            ChatKind::Private
        } else {
            ChatKind::Group
        },
        message: MessageRef(i64::from(msg.id.0)),
        text: msg.text().map(str::to_string),
    }
}

fn to_reply_markup(keyboard: Keyboard) -> Option<tg::ReplyMarkup> {
    match keyboard {
        Keyboard::Unchanged => None,
        Keyboard::Remove => Some(tg::ReplyMarkup::KeyboardRemove(tg::KeyboardRemove::new())),
        Keyboard::Buttons(rows) => {
            let rows: Vec<Vec<tg::KeyboardButton>> = rows
                .into_iter()
                .map(|row| row.into_iter().map(tg::KeyboardButton::new).collect())
                .collect();
            Some(tg::ReplyMarkup::Keyboard(
                tg::KeyboardMarkup::new(rows)
                    .resize_keyboard()
                    .one_time_keyboard(),
            ))
        }
    }
}

fn map_request_error(err: RequestError) -> TransportError {
    match err {
        RequestError::Network(e) => TransportError::Network(e.to_string()),
        other => TransportError::Api(other.to_string()),
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send(&self, chat: ChatId, text: &str, keyboard: Keyboard) -> TransportResult<MessageRef> {
        let mut request = self.bot.send_message(tg::ChatId(chat.0), text);
        if let Some(markup) = to_reply_markup(keyboard) {
            request = request.reply_markup(markup);
        }

        let sent = request.await.map_err(map_request_error)?;
        Ok(MessageRef(i64::from(sent.id.0)))
    }

    async fn delete(&self, chat: ChatId, message: MessageRef) -> TransportResult<()> {
        let id = i32::try_from(message.0).map_err(|_| TransportError::InvalidReference(message))?;
        self.bot
            .delete_message(tg::ChatId(chat.0), tg::MessageId(id))
            .await
            .map_err(map_request_error)?;
        Ok(())
    }

    async fn leave(&self, chat: ChatId) -> TransportResult<()> {
        self.bot
            .leave_chat(tg::ChatId(chat.0))
            .await
            .map_err(map_request_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyboard_mapping() {
        assert!(to_reply_markup(Keyboard::Unchanged).is_none());
        assert!(matches!(
            to_reply_markup(Keyboard::Remove),
            Some(tg::ReplyMarkup::KeyboardRemove(_))
        ));

        match to_reply_markup(Keyboard::buttons(&[&["Save", "Cancel"], &["Back"]])) {
            Some(tg::ReplyMarkup::Keyboard(markup)) => {
                assert_eq!(markup.keyboard.len(), 2);
                assert_eq!(markup.keyboard[0][1].text, "Cancel");
            }
            other => panic!("Expected reply keyboard, got {:?}", other),
        }
    }
}
