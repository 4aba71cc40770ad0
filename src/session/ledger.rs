//! History ledger
//!
//! References to every message the bot sent in a session, kept only so they
//! can be bulk-deleted on logout, expiry or reset. Inbound user messages are
//! not tracked; passwords and record plaintext are deleted on arrival instead.

use crate::chat::{ChatId, MessageRef, Transport};
use tracing::debug;

#[derive(Debug, Default, Clone)]
pub struct HistoryLedger {
    entries: Vec<MessageRef>,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: MessageRef) {
        self.entries.push(message);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[MessageRef] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Delete every tracked message once, then empty the ledger
    ///
    /// Individual failures are skipped. Returns the number deleted.
    pub async fn purge_all<T: Transport>(&mut self, chat: ChatId, transport: &T) -> usize {
        let mut deleted = 0;
        for message in self.entries.drain(..) {
            match transport.delete(chat, message).await {
                Ok(()) => deleted += 1,
                Err(e) => debug!(chat_id = %chat, "Skipping undeletable message: {}", e),
            }
        }
        deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::MockTransport;

    #[tokio::test]
    async fn test_purge_skips_failures() {
        let transport = MockTransport::new();
        let chat = ChatId(1);
        let mut ledger = HistoryLedger::new();
        for id in [10, 11, 12] {
            ledger.append(MessageRef(id));
        }
        transport.fail_delete_of(MessageRef(11));

        assert_eq!(ledger.purge_all(chat, &transport).await, 2);
        assert!(ledger.is_empty());
        assert!(transport.was_deleted(chat, MessageRef(10)));
        assert!(transport.was_deleted(chat, MessageRef(12)));
    }

    #[test]
    fn test_append_keeps_order_and_duplicates() {
        let mut ledger = HistoryLedger::new();
        ledger.append(MessageRef(2));
        ledger.append(MessageRef(1));
        ledger.append(MessageRef(2));
        assert_eq!(ledger.entries(), &[MessageRef(2), MessageRef(1), MessageRef(2)]);
        ledger.clear();
        assert_eq!(ledger.len(), 0);
    }
}
