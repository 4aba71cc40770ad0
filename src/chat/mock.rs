//! Mock Transport for Testing
//!
//! Records every send/delete/leave so tests can assert on the transcript
//! without a real messaging network.

use super::traits::*;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Mock transport for testing
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    sent_messages: Vec<SentMessage>,
    deleted: Vec<(ChatId, MessageRef)>,
    left_chats: Vec<ChatId>,
    undeletable: HashSet<MessageRef>,
    fail_sends: bool,
    next_message_id: i64,
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub chat: ChatId,
    pub message: MessageRef,
    pub text: String,
    pub keyboard: Keyboard,
}

impl MockTransport {
    /// Create new mock transport
    ///
    /// Outbound message ids start at 1_000_000 so they never collide with the
    /// inbound ids tests pick by hand.
    pub fn new() -> Self {
        let transport = Self::default();
        transport.state.lock().unwrap().next_message_id = 1_000_000;
        transport
    }

    /// Get sent messages for assertions
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.state.lock().unwrap().sent_messages.clone()
    }

    /// Texts sent to one chat, in order
    pub fn sent_texts(&self, chat: ChatId) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .sent_messages
            .iter()
            .filter(|m| m.chat == chat)
            .map(|m| m.text.clone())
            .collect()
    }

    /// Last message sent to a chat
    pub fn last_sent(&self, chat: ChatId) -> Option<SentMessage> {
        self.state
            .lock()
            .unwrap()
            .sent_messages
            .iter()
            .rev()
            .find(|m| m.chat == chat)
            .cloned()
    }

    /// Message references successfully deleted
    pub fn deleted(&self) -> Vec<(ChatId, MessageRef)> {
        self.state.lock().unwrap().deleted.clone()
    }

    /// Check if a message was deleted
    pub fn was_deleted(&self, chat: ChatId, message: MessageRef) -> bool {
        self.state
            .lock()
            .unwrap()
            .deleted
            .contains(&(chat, message))
    }

    /// Chats the bot left
    pub fn left_chats(&self) -> Vec<ChatId> {
        self.state.lock().unwrap().left_chats.clone()
    }

    /// Make deletion of a specific message fail
    pub fn fail_delete_of(&self, message: MessageRef) {
        self.state.lock().unwrap().undeletable.insert(message);
    }

    /// Make every send fail (or succeed again)
    pub fn set_fail_sends(&self, fail: bool) {
        self.state.lock().unwrap().fail_sends = fail;
    }

    /// Clear all recorded traffic
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.sent_messages.clear();
        state.deleted.clear();
        state.left_chats.clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, chat: ChatId, text: &str, keyboard: Keyboard) -> TransportResult<MessageRef> {
        let mut state = self.state.lock().unwrap();
        if state.fail_sends {
            return Err(TransportError::Network("mock send failure".to_string()));
        }

        let message = MessageRef(state.next_message_id);
        state.next_message_id += 1;
        state.sent_messages.push(SentMessage {
            chat,
            message,
            text: text.to_string(),
            keyboard,
        });
        Ok(message)
    }

    async fn delete(&self, chat: ChatId, message: MessageRef) -> TransportResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.undeletable.contains(&message) {
            return Err(TransportError::MessageNotFound(message));
        }
        state.deleted.push((chat, message));
        Ok(())
    }

    async fn leave(&self, chat: ChatId) -> TransportResult<()> {
        self.state.lock().unwrap().left_chats.push(chat);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_message() {
        let transport = MockTransport::new();
        let chat = ChatId(1);

        let first = transport.send(chat, "Hello", Keyboard::Remove).await.unwrap();
        let second = transport.send(chat, "Again", Keyboard::Unchanged).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(transport.sent_texts(chat), vec!["Hello", "Again"]);
        assert_eq!(transport.last_sent(chat).unwrap().message, second);
    }

    #[tokio::test]
    async fn test_delete_failure_injection() {
        let transport = MockTransport::new();
        let chat = ChatId(1);

        transport.fail_delete_of(MessageRef(5));
        assert!(transport.delete(chat, MessageRef(5)).await.is_err());
        transport.delete(chat, MessageRef(6)).await.unwrap();

        assert!(!transport.was_deleted(chat, MessageRef(5)));
        assert!(transport.was_deleted(chat, MessageRef(6)));
    }

    #[tokio::test]
    async fn test_send_failure_injection() {
        let transport = MockTransport::new();
        transport.set_fail_sends(true);
        assert!(matches!(
            transport.send(ChatId(1), "x", Keyboard::Remove).await,
            Err(TransportError::Network(_))
        ));
        assert!(transport.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn test_leave() {
        let transport = MockTransport::new();
        transport.leave(ChatId(-100)).await.unwrap();
        assert_eq!(transport.left_chats(), vec![ChatId(-100)]);
    }
}
