//! Record staging
//!
//! A submitted secret is encrypted immediately and held in the
//! `ConfirmingRecord` variant until the user saves or cancels. The plaintext
//! message is deleted from the chat before anything else happens.

use super::machine::SessionMachine;
use super::state::{Conversation, Session, StagedRecord};
use crate::chat::messages::*;
use crate::chat::{MessageRef, Transport};
use crate::storage::AccountStore;
use tracing::{info, warn};

impl<S: AccountStore, T: Transport> SessionMachine<S, T> {
    /// Encrypt the secret and wait for confirmation
    pub async fn stage(&self, session: &mut Session, message: MessageRef, plaintext: &str) {
        self.efface(session.chat, message).await;

        let sealed = match session.cipher() {
            Some(cipher) => cipher.encrypt(plaintext.as_bytes()),
            None => {
                warn!(chat_id = %session.chat, "No record key while staging");
                session.conversation = Conversation::Idle;
                self.reply_error(session, kb_main_menu()).await;
                return;
            }
        };

        match sealed {
            Ok(ciphertext) => {
                let size = plaintext.len();
                session.conversation = Conversation::ConfirmingRecord(StagedRecord {
                    ciphertext,
                    size: size as u64,
                });
                self.reply(session, &msg_confirm_record(size), kb_confirm_record())
                    .await;
            }
            Err(e) => {
                warn!(chat_id = %session.chat, "Failed to encrypt record: {}", e);
                session.conversation = Conversation::Idle;
                self.reply_error(session, kb_main_menu()).await;
            }
        }
    }

    /// Persist the staged record; the stage is cleared either way
    pub async fn commit(&self, session: &mut Session) {
        let Some(staged) = session.take_staged() else {
            warn!(chat_id = %session.chat, "Commit without a staged record");
            self.reply_error(session, kb_main_menu()).await;
            return;
        };

        match self
            .store
            .create_record(session.chat, &staged.ciphertext, staged.size)
            .await
        {
            Ok(record) => {
                info!(chat_id = %session.chat, record, size = staged.size, "Record saved");
                self.reply(session, msg_record_saved(), kb_main_menu()).await;
            }
            Err(e) => {
                warn!(chat_id = %session.chat, "Failed to save record: {}", e);
                self.reply_error(session, kb_main_menu()).await;
            }
        }
    }

    /// Drop the staged record without persisting it
    pub async fn discard(&self, session: &mut Session) {
        if session.take_staged().is_none() {
            warn!(chat_id = %session.chat, "Discard without a staged record");
            self.reply_error(session, kb_main_menu()).await;
            return;
        }
        self.reply(session, msg_record_discarded(), kb_main_menu()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatId, InboundMessage, MockTransport};
    use crate::session::{ConversationState, SessionConfig, SessionEvent, TimerService};
    use crate::storage::MemoryAccountStore;
    use std::sync::Arc;

    const CHAT: ChatId = ChatId(5);

    async fn authorized() -> (
        SessionMachine<MemoryAccountStore, MockTransport>,
        Arc<MemoryAccountStore>,
        MockTransport,
        Session,
    ) {
        let store = Arc::new(MemoryAccountStore::new());
        let transport = MockTransport::new();
        let (timers, _expiries) = TimerService::new();
        let machine =
            SessionMachine::new(store.clone(), transport.clone(), timers, SessionConfig::default());
        let mut session = Session::new(CHAT);

        for (id, text) in [(1, CMD_START), (2, "Passw0rd"), (3, "Passw0rd"), (4, BTN_RECORD)] {
            let inbound = InboundMessage::private_text(CHAT, MessageRef(id), text);
            machine.handle(&mut session, SessionEvent::Inbound(inbound)).await;
        }
        assert_eq!(session.state(), ConversationState::TypingRecord);
        (machine, store, transport, session)
    }

    #[tokio::test]
    async fn test_stage_and_commit_roundtrip() {
        let (machine, store, transport, mut session) = authorized().await;

        machine.stage(&mut session, MessageRef(10), "my secret").await;
        assert!(transport.was_deleted(CHAT, MessageRef(10)));
        assert_eq!(session.state(), ConversationState::ConfirmingRecord);

        machine.commit(&mut session).await;
        assert_eq!(session.state(), ConversationState::Idle);

        let stored = store.stored_ciphertexts(CHAT);
        assert_eq!(stored.len(), 1);
        let plaintext = session.cipher().unwrap().decrypt(&stored[0]).unwrap();
        assert_eq!(plaintext.as_slice(), b"my secret");

        let overview = store.records_overview(CHAT).await.unwrap();
        assert_eq!(overview[0].size, 9);
    }

    #[tokio::test]
    async fn test_discard_persists_nothing() {
        let (machine, store, transport, mut session) = authorized().await;

        machine.stage(&mut session, MessageRef(10), "my secret").await;
        machine.discard(&mut session).await;

        assert_eq!(session.state(), ConversationState::Idle);
        assert!(store.stored_ciphertexts(CHAT).is_empty());
        assert_eq!(
            transport.last_sent(CHAT).unwrap().text,
            msg_record_discarded()
        );
    }

    #[tokio::test]
    async fn test_commit_failure_clears_stage() {
        let (machine, store, transport, mut session) = authorized().await;
        store.set_fail_record_writes(true);

        machine.stage(&mut session, MessageRef(10), "my secret").await;
        machine.commit(&mut session).await;

        assert_eq!(session.state(), ConversationState::Idle);
        assert!(store.stored_ciphertexts(CHAT).is_empty());
        assert_eq!(transport.last_sent(CHAT).unwrap().text, msg_generic_error());

        // A second save has nothing to resubmit
        machine.commit(&mut session).await;
        store.set_fail_record_writes(false);
        assert!(store.stored_ciphertexts(CHAT).is_empty());
    }

    #[tokio::test]
    async fn test_commit_without_stage_is_defensive() {
        let (machine, store, transport, mut session) = authorized().await;
        session.conversation = Conversation::Idle;

        machine.commit(&mut session).await;
        machine.discard(&mut session).await;

        assert_eq!(session.state(), ConversationState::Idle);
        assert!(store.stored_ciphertexts(CHAT).is_empty());
        assert_eq!(transport.last_sent(CHAT).unwrap().text, msg_generic_error());
    }
}
