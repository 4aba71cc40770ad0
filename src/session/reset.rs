//! Destructive reset
//!
//! After a failed verification the user may create a new password, which
//! wipes the account. The record count is snapshotted once when the wipe is
//! requested and the user must type the phrase naming that count.

use super::machine::SessionMachine;
use super::state::{Conversation, Session};
use crate::chat::messages::*;
use crate::chat::{Keyboard, Transport};
use crate::storage::AccountStore;
use tracing::{info, warn};

impl<S: AccountStore, T: Transport> SessionMachine<S, T> {
    /// Snapshot the record count and ask for the confirmation phrase
    pub(super) async fn request_wipe(&self, session: &mut Session) {
        match self.store.records_overview(session.chat).await {
            Ok(records) => {
                let count = records.len() as u64;
                session.conversation = Conversation::ChoosePasswordAction {
                    awaiting_wipe: Some(count),
                };
                self.reply(session, &msg_wipe_request(count), Keyboard::Remove)
                    .await;
            }
            Err(e) => {
                warn!(chat_id = %session.chat, "Failed to count records: {}", e);
                self.reply_error(session, kb_verify_failed()).await;
            }
        }
    }

    /// Delete the account and records, then reset the session to `Start`
    pub(super) async fn confirm_wipe(&self, session: &mut Session) {
        let (accounts, records) = match self.store.delete_account_and_records(session.chat).await {
            Ok(counts) => counts,
            Err(e) => {
                warn!(chat_id = %session.chat, "Failed to wipe account: {}", e);
                self.reply_error(session, Keyboard::Unchanged).await;
                return;
            }
        };
        info!(chat_id = %session.chat, accounts, records, "Account wiped");

        let chat = session.chat;
        session.disarm_timer();
        session.history.purge_all(chat, &self.transport).await;
        *session = Session::new(chat);

        self.reply(session, &msg_wipe_done(accounts, records), kb_start())
            .await;
    }
}

#[cfg(test)]
mod tests {
    use crate::chat::messages::*;
    use crate::chat::{ChatId, InboundMessage, MessageRef, MockTransport};
    use crate::crypto::fingerprint;
    use crate::session::{
        Conversation, ConversationState, PasswordMode, Session, SessionConfig, SessionEvent,
        SessionMachine, TimerService,
    };
    use crate::storage::{AccountStore, MemoryAccountStore};
    use std::sync::Arc;

    const CHAT: ChatId = ChatId(3);

    async fn send(
        machine: &SessionMachine<MemoryAccountStore, MockTransport>,
        session: &mut Session,
        id: i64,
        text: &str,
    ) {
        let inbound = InboundMessage::private_text(CHAT, MessageRef(id), text);
        machine.handle(session, SessionEvent::Inbound(inbound)).await;
    }

    async fn failed_verification() -> (
        SessionMachine<MemoryAccountStore, MockTransport>,
        Arc<MemoryAccountStore>,
        MockTransport,
        Session,
    ) {
        let store = Arc::new(MemoryAccountStore::new());
        store
            .set_password_fingerprint(CHAT, &fingerprint("Passw0rd"))
            .await
            .unwrap();
        for i in 0..3u8 {
            store.create_record(CHAT, &[i], 1).await.unwrap();
        }

        let transport = MockTransport::new();
        let (timers, _expiries) = TimerService::new();
        let machine =
            SessionMachine::new(store.clone(), transport.clone(), timers, SessionConfig::default());
        let mut session = Session::new(CHAT);

        send(&machine, &mut session, 1, CMD_START).await;
        send(&machine, &mut session, 2, "wrong").await;
        assert_eq!(session.state(), ConversationState::ChoosePasswordAction);
        (machine, store, transport, session)
    }

    #[tokio::test]
    async fn test_wipe_with_exact_phrase() {
        let (machine, store, transport, mut session) = failed_verification().await;

        send(&machine, &mut session, 3, BTN_PWD_NEW).await;
        assert_eq!(
            session.conversation,
            Conversation::ChoosePasswordAction { awaiting_wipe: Some(3) }
        );

        send(&machine, &mut session, 4, "Consciously I remove all 3 records").await;
        assert_eq!(session.state(), ConversationState::Start);
        assert_eq!(session.password_mode, PasswordMode::Setting);
        assert!(!session.has_timer());
        assert_eq!(store.account_count(CHAT), 0);
        assert_eq!(transport.last_sent(CHAT).unwrap().text, msg_wipe_done(1, 3));
        // Earlier bot replies were purged
        assert!(transport.deleted().len() >= 2);
    }

    #[tokio::test]
    async fn test_wrong_phrase_is_noop() {
        let (machine, store, transport, mut session) = failed_verification().await;
        send(&machine, &mut session, 3, BTN_PWD_NEW).await;
        let sent_before = transport.sent_messages().len();

        send(&machine, &mut session, 4, "Consciously I remove all 4 records").await;
        send(&machine, &mut session, 5, "consciously i remove all 3 records").await;

        assert_eq!(
            session.conversation,
            Conversation::ChoosePasswordAction { awaiting_wipe: Some(3) }
        );
        assert_eq!(transport.sent_messages().len(), sent_before);
        assert_eq!(store.account_count(CHAT), 1);
    }

    #[tokio::test]
    async fn test_snapshot_count_is_kept() {
        let (machine, store, _transport, mut session) = failed_verification().await;
        send(&machine, &mut session, 3, BTN_PWD_NEW).await;

        // A record added after the snapshot does not change the phrase
        store.create_record(CHAT, b"late", 4).await.unwrap();
        send(&machine, &mut session, 4, "Consciously I remove all 3 records").await;

        assert_eq!(session.state(), ConversationState::Start);
        assert_eq!(store.account_count(CHAT), 0);
    }

    #[tokio::test]
    async fn test_duplicate_rows_counted_in_phrase() {
        let (machine, store, transport, mut session) = failed_verification().await;
        let legacy = store.insert_duplicate_account(CHAT, None);
        store.insert_record_for_account(legacy, b"legacy");

        send(&machine, &mut session, 3, BTN_PWD_NEW).await;
        assert_eq!(transport.last_sent(CHAT).unwrap().text, msg_wipe_request(4));

        send(&machine, &mut session, 4, "Consciously I remove all 4 records").await;
        assert_eq!(transport.last_sent(CHAT).unwrap().text, msg_wipe_done(2, 4));
    }

    #[tokio::test]
    async fn test_try_again_leaves_wipe_flow() {
        let (machine, _store, _transport, mut session) = failed_verification().await;
        send(&machine, &mut session, 3, BTN_PWD_NEW).await;
        send(&machine, &mut session, 4, BTN_PWD_TRYAGAIN).await;
        assert_eq!(session.state(), ConversationState::TypingPassword);

        send(&machine, &mut session, 5, "Passw0rd").await;
        assert!(session.is_authorized());
    }
}
