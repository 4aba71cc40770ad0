//! Session state machine
//!
//! Routes one event at a time for one session:
//! - Activity bookkeeping (rearm the timer while authorized)
//! - Entry (`/start`) and password setup/verification
//! - Main menu, logout and forced deauthorization on expiry
//!
//! Record staging, browsing and the destructive reset live in sibling
//! modules as further `impl` blocks on `SessionMachine`.

use super::state::{Conversation, ConversationState, PasswordMode, Session};
use super::timer::TimerService;
use super::{SessionConfig, SessionEvent};
use crate::chat::messages::*;
use crate::chat::{ChatId, InboundMessage, Keyboard, MessageRef, Transport};
use crate::crypto::{fingerprint, is_password_weak, RecordCipher};
use crate::storage::AccountStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives sessions against the account store and the transport
pub struct SessionMachine<S: AccountStore, T: Transport> {
    pub(super) store: Arc<S>,
    pub(super) transport: T,
    pub(super) timers: TimerService,
    pub(super) config: SessionConfig,
}

impl<S: AccountStore, T: Transport> SessionMachine<S, T> {
    pub fn new(store: Arc<S>, transport: T, timers: TimerService, config: SessionConfig) -> Self {
        Self {
            store,
            transport,
            timers,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Process one event to completion
    pub async fn handle(&self, session: &mut Session, event: SessionEvent) {
        match event {
            SessionEvent::Inbound(message) => self.handle_inbound(session, message).await,
            SessionEvent::Expired { generation } => self.handle_expiry(session, generation).await,
        }
    }

    async fn handle_inbound(&self, session: &mut Session, message: InboundMessage) {
        // An expiry still queued behind this message must win
        if session.authorization_lapsed(self.config.inactivity_timeout) {
            debug!(chat_id = %session.chat, "Authorization lapsed before message");
            // The dropped message may be a record or password in plain text
            self.efface(session.chat, message.message).await;
            self.expire(session).await;
            return;
        }
        session.touch(&self.timers, self.config.inactivity_timeout);

        let state = session.state();
        if state.requires_authorization() && !session.is_authorized() {
            warn!(chat_id = %session.chat, %state, "Unauthorized session in protected state");
            session.conversation = Conversation::TypingPassword;
            self.reply(session, msg_send_password(), Keyboard::Remove).await;
            return;
        }

        let Some(text) = message.text.as_deref() else {
            self.non_text(session).await;
            return;
        };

        if text.trim() == CMD_START {
            self.enter(session).await;
            return;
        }

        debug!(chat_id = %session.chat, %state, "Handling message");
        match state {
            ConversationState::Start => {
                if text.trim() == BTN_START {
                    self.enter(session).await;
                } else {
                    self.reply(session, msg_press_start(), kb_start()).await;
                }
            }
            ConversationState::TypingPassword => {
                self.submit_password(session, message.message, text).await
            }
            ConversationState::ChoosePasswordAction => {
                self.choose_password_action(session, text).await
            }
            ConversationState::Idle => self.main_menu(session, text.trim()).await,
            ConversationState::TypingRecord => {
                self.stage(session, message.message, text).await
            }
            ConversationState::ConfirmingRecord => match text.trim() {
                BTN_RECORD_SAVE => self.commit(session).await,
                BTN_RECORD_CANCEL => self.discard(session).await,
                _ => {
                    self.reply(session, msg_choose_save_or_cancel(), kb_confirm_record())
                        .await
                }
            },
            ConversationState::Browsing => self.browse_input(session, text.trim()).await,
        }
    }

    /// Photos, stickers and the like: repeat the prompt where text is expected
    async fn non_text(&self, session: &mut Session) {
        match session.state() {
            ConversationState::TypingRecord => {
                self.reply(session, msg_type_record(), Keyboard::Remove).await
            }
            ConversationState::ConfirmingRecord => {
                self.reply(session, msg_choose_save_or_cancel(), kb_confirm_record())
                    .await
            }
            state => debug!(chat_id = %session.chat, %state, "Ignoring non-text message"),
        }
    }

    async fn handle_expiry(&self, session: &mut Session, generation: u64) {
        if session.timer_generation() != Some(generation) {
            debug!(chat_id = %session.chat, generation, "Ignoring stale timer");
            return;
        }
        self.expire(session).await;
    }

    /// Forced deauthorization after inactivity
    ///
    /// Overrides whatever state the conversation was in.
    pub(super) async fn expire(&self, session: &mut Session) {
        info!(chat_id = %session.chat, state = %session.state(), "Session expired");

        if self.config.clear_history_on_alarm {
            session.history.purge_all(session.chat, &self.transport).await;
        }
        session.deauthorize();
        session.conversation = Conversation::TypingPassword;
        self.reply(session, msg_session_expired(), Keyboard::Remove).await;
    }

    // ========================================================================
    // Entry
    // ========================================================================

    /// Load the account and decide between password entry and the menu
    async fn enter(&self, session: &mut Session) {
        if session.is_authorized() {
            session.conversation = Conversation::Idle;
            self.reply(session, msg_already_authorized(), kb_main_menu()).await;
            return;
        }

        if let Err(e) = self.store.create_if_absent(session.chat).await {
            warn!(chat_id = %session.chat, "Failed to load account: {}", e);
            self.reply_error(session, Keyboard::Unchanged).await;
            return;
        }

        match self.store.password_fingerprint(session.chat).await {
            Ok(Some(_)) => {
                session.password_mode = PasswordMode::Verifying;
                session.pending_fingerprint = None;
                session.conversation = Conversation::TypingPassword;
                self.reply(session, msg_welcome_back(), Keyboard::Remove).await;
            }
            Ok(None) => {
                session.password_mode = PasswordMode::Setting;
                session.pending_fingerprint = None;
                session.conversation = Conversation::TypingPassword;
                self.reply(session, msg_welcome_new(), Keyboard::Remove).await;
            }
            Err(e) => {
                warn!(chat_id = %session.chat, "Failed to read password: {}", e);
                self.reply_error(session, Keyboard::Unchanged).await;
            }
        }
    }

    // ========================================================================
    // Password
    // ========================================================================

    async fn submit_password(&self, session: &mut Session, message: MessageRef, password: &str) {
        let submitted = fingerprint(password);
        let weak = is_password_weak(password);
        self.efface(session.chat, message).await;

        match session.password_mode {
            PasswordMode::Verifying => {
                self.verify_password(session, password, &submitted).await
            }
            PasswordMode::Setting => match session.pending_fingerprint.take() {
                None => {
                    session.pending_fingerprint = Some(submitted);
                    if weak {
                        session.conversation =
                            Conversation::ChoosePasswordAction { awaiting_wipe: None };
                        self.reply(session, msg_weak_password(), kb_weak_password())
                            .await;
                    } else {
                        self.reply(session, msg_repeat_password(), Keyboard::Remove)
                            .await;
                    }
                }
                Some(pending) if pending == submitted => {
                    if let Err(e) = self
                        .store
                        .set_password_fingerprint(session.chat, &submitted)
                        .await
                    {
                        warn!(chat_id = %session.chat, "Failed to store password: {}", e);
                        session.pending_fingerprint = Some(pending);
                        self.reply_error(session, Keyboard::Remove).await;
                        return;
                    }
                    info!(chat_id = %session.chat, "Password created");
                    if self.authorize(session, password).await {
                        self.reply(session, msg_password_created(), kb_main_menu())
                            .await;
                    }
                }
                Some(pending) => {
                    session.pending_fingerprint = Some(pending);
                    session.conversation =
                        Conversation::ChoosePasswordAction { awaiting_wipe: None };
                    self.reply(session, msg_password_mismatch(), kb_setup_mismatch())
                        .await;
                }
            },
            PasswordMode::Authorized => {
                session.conversation = Conversation::Idle;
                self.reply(session, msg_already_authorized(), kb_main_menu()).await;
            }
        }
    }

    async fn verify_password(
        &self,
        session: &mut Session,
        password: &str,
        submitted: &crate::crypto::Fingerprint,
    ) {
        match self.store.password_fingerprint(session.chat).await {
            Ok(Some(stored)) if &stored == submitted => {
                info!(chat_id = %session.chat, "Password verified");
                if self.authorize(session, password).await {
                    self.reply(session, msg_authorized(), kb_main_menu()).await;
                }
            }
            Ok(Some(_)) => {
                info!(chat_id = %session.chat, "Wrong password");
                session.deauthorize();
                session.conversation = Conversation::ChoosePasswordAction { awaiting_wipe: None };
                self.reply(session, msg_wrong_password(), kb_verify_failed()).await;
            }
            Ok(None) => {
                warn!(chat_id = %session.chat, "Password vanished, restarting setup");
                session.password_mode = PasswordMode::Setting;
                session.pending_fingerprint = None;
                self.reply(session, msg_welcome_new(), Keyboard::Remove).await;
            }
            Err(e) => {
                warn!(chat_id = %session.chat, "Failed to read password: {}", e);
                self.reply_error(session, Keyboard::Remove).await;
            }
        }
    }

    /// Derive the record key and enter `Idle`; false if the key failed
    async fn authorize(&self, session: &mut Session, password: &str) -> bool {
        match RecordCipher::derive(password, session.chat) {
            Ok(cipher) => {
                session.authorize(cipher, &self.timers, self.config.inactivity_timeout);
                session.conversation = Conversation::Idle;
                true
            }
            Err(e) => {
                warn!(chat_id = %session.chat, "Failed to derive record key: {}", e);
                self.reply_error(session, Keyboard::Remove).await;
                false
            }
        }
    }

    async fn choose_password_action(&self, session: &mut Session, text: &str) {
        if let Conversation::ChoosePasswordAction {
            awaiting_wipe: Some(count),
        } = session.conversation
        {
            if text == wipe_confirmation_phrase(count) {
                self.confirm_wipe(session).await;
                return;
            }
        }

        let has_pending = session.pending_fingerprint.is_some();
        match (session.password_mode, text.trim()) {
            (PasswordMode::Setting, BTN_PWD_STRONGER) => {
                session.pending_fingerprint = None;
                session.conversation = Conversation::TypingPassword;
                self.reply(session, msg_send_strong_password(), Keyboard::Remove).await;
            }
            (PasswordMode::Setting, BTN_PWD_LEAVEWEAK) if has_pending => {
                session.conversation = Conversation::TypingPassword;
                self.reply(session, msg_keep_weak_password(), Keyboard::Remove).await;
            }
            (PasswordMode::Setting, BTN_PWD_TRYAGAIN) if has_pending => {
                session.conversation = Conversation::TypingPassword;
                self.reply(session, msg_repeat_password(), Keyboard::Remove).await;
            }
            (PasswordMode::Setting, BTN_PWD_STARTOVER) => {
                session.pending_fingerprint = None;
                session.conversation = Conversation::TypingPassword;
                self.reply(session, msg_start_over(), Keyboard::Remove).await;
            }
            (PasswordMode::Verifying, BTN_PWD_TRYAGAIN) => {
                session.conversation = Conversation::TypingPassword;
                self.reply(session, msg_send_password(), Keyboard::Remove).await;
            }
            (PasswordMode::Verifying, BTN_PWD_NEW) => self.request_wipe(session).await,
            _ => debug!(chat_id = %session.chat, "Unrecognised password action, ignoring"),
        }
    }

    // ========================================================================
    // Menu
    // ========================================================================

    async fn main_menu(&self, session: &mut Session, choice: &str) {
        match choice {
            BTN_RECORD => {
                session.conversation = Conversation::TypingRecord;
                self.reply(session, msg_type_record(), Keyboard::Remove).await;
            }
            BTN_BROWSE => self.open_browser(session).await,
            BTN_LOGOUT => self.logout(session).await,
            _ => self.reply(session, msg_main_menu(), kb_main_menu()).await,
        }
    }

    async fn logout(&self, session: &mut Session) {
        info!(chat_id = %session.chat, "Logging out");
        if self.config.clear_history_on_logout {
            session.history.purge_all(session.chat, &self.transport).await;
        } else {
            session.history.clear();
        }
        session.deauthorize();
        session.conversation = Conversation::TypingPassword;
        self.reply(session, msg_logged_out(), Keyboard::Remove).await;
    }

    // ========================================================================
    // Transport helpers
    // ========================================================================

    /// Send a reply and track it in the history ledger
    pub(super) async fn reply(&self, session: &mut Session, text: &str, keyboard: Keyboard) {
        match self.transport.send(session.chat, text, keyboard).await {
            Ok(message) => session.history.append(message),
            Err(e) => warn!(chat_id = %session.chat, "Failed to send reply: {}", e),
        }
    }

    pub(super) async fn reply_error(&self, session: &mut Session, keyboard: Keyboard) {
        self.reply(session, msg_generic_error(), keyboard).await;
    }

    /// Best-effort removal of a user message carrying a secret
    pub(super) async fn efface(&self, chat: ChatId, message: MessageRef) {
        if let Err(e) = self.transport.delete(chat, message).await {
            warn!(chat_id = %chat, "Failed to delete secret message: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::MockTransport;
    use crate::storage::MemoryAccountStore;
    use std::time::Duration;

    const CHAT: ChatId = ChatId(77);

    struct Harness {
        machine: SessionMachine<MemoryAccountStore, MockTransport>,
        store: Arc<MemoryAccountStore>,
        transport: MockTransport,
        session: Session,
        next_id: i64,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(MemoryAccountStore::new());
            let transport = MockTransport::new();
            let (timers, _expiries) = TimerService::new();
            let machine = SessionMachine::new(
                store.clone(),
                transport.clone(),
                timers,
                SessionConfig::default(),
            );
            Self {
                machine,
                store,
                transport,
                session: Session::new(CHAT),
                next_id: 0,
            }
        }

        async fn send(&mut self, text: &str) -> MessageRef {
            self.next_id += 1;
            let message = MessageRef(self.next_id);
            let inbound = InboundMessage::private_text(CHAT, message, text);
            self.machine
                .handle(&mut self.session, SessionEvent::Inbound(inbound))
                .await;
            message
        }

        fn last_text(&self) -> String {
            self.transport.last_sent(CHAT).unwrap().text
        }
    }

    #[tokio::test]
    async fn test_start_without_password_enters_setting() {
        let mut h = Harness::new();
        h.send(CMD_START).await;
        assert_eq!(h.session.state(), ConversationState::TypingPassword);
        assert_eq!(h.session.password_mode, PasswordMode::Setting);
        assert_eq!(h.last_text(), msg_welcome_new());
    }

    #[tokio::test]
    async fn test_start_state_prompts_for_start() {
        let mut h = Harness::new();
        h.send("hello").await;
        assert_eq!(h.session.state(), ConversationState::Start);
        assert_eq!(h.last_text(), msg_press_start());

        h.send(BTN_START).await;
        assert_eq!(h.session.state(), ConversationState::TypingPassword);
    }

    #[tokio::test]
    async fn test_password_messages_are_deleted() {
        let mut h = Harness::new();
        h.send(CMD_START).await;
        let first = h.send("Passw0rd").await;
        let second = h.send("Passw0rd").await;

        assert!(h.transport.was_deleted(CHAT, first));
        assert!(h.transport.was_deleted(CHAT, second));
        assert!(h.session.is_authorized());
        assert_eq!(h.session.state(), ConversationState::Idle);
        assert!(h.session.has_timer());
        assert_eq!(h.last_text(), msg_password_created());
    }

    #[tokio::test]
    async fn test_setup_mismatch_keeps_first_entry() {
        let mut h = Harness::new();
        h.send(CMD_START).await;
        h.send("Passw0rd").await;
        h.send("Different1").await;
        assert_eq!(h.session.state(), ConversationState::ChoosePasswordAction);
        assert!(h.session.pending_fingerprint.is_some());

        h.send(BTN_PWD_TRYAGAIN).await;
        assert_eq!(h.session.state(), ConversationState::TypingPassword);
        h.send("Passw0rd").await;
        assert!(h.session.is_authorized());
    }

    #[tokio::test]
    async fn test_start_over_clears_pending() {
        let mut h = Harness::new();
        h.send(CMD_START).await;
        h.send("Passw0rd").await;
        h.send("Different1").await;
        h.send(BTN_PWD_STARTOVER).await;

        assert_eq!(h.session.state(), ConversationState::TypingPassword);
        assert!(h.session.pending_fingerprint.is_none());
    }

    #[tokio::test]
    async fn test_weak_password_kept() {
        let mut h = Harness::new();
        h.send(CMD_START).await;
        h.send("abc").await;
        assert_eq!(h.last_text(), msg_weak_password());

        h.send(BTN_PWD_LEAVEWEAK).await;
        assert_eq!(h.session.state(), ConversationState::TypingPassword);
        h.send("abc").await;
        assert!(h.session.is_authorized());
    }

    #[tokio::test]
    async fn test_unmatched_choice_is_noop() {
        let mut h = Harness::new();
        h.send(CMD_START).await;
        h.send("abc").await;
        let sent_before = h.transport.sent_messages().len();

        h.send("whatever").await;
        assert_eq!(h.session.state(), ConversationState::ChoosePasswordAction);
        assert_eq!(h.transport.sent_messages().len(), sent_before);
    }

    #[tokio::test]
    async fn test_verify_after_logout() {
        let mut h = Harness::new();
        h.send(CMD_START).await;
        h.send("Passw0rd").await;
        h.send("Passw0rd").await;

        h.send(BTN_LOGOUT).await;
        assert_eq!(h.session.state(), ConversationState::TypingPassword);
        assert_eq!(h.session.password_mode, PasswordMode::Verifying);
        assert!(!h.session.has_timer());
        // Only the logout notice remains tracked
        assert_eq!(h.session.history.len(), 1);

        h.send("Passw0rd").await;
        assert!(h.session.is_authorized());
        assert_eq!(h.last_text(), msg_authorized());
    }

    #[tokio::test]
    async fn test_store_outage_reports_error() {
        let mut h = Harness::new();
        h.store.set_unavailable(true);
        h.send(CMD_START).await;

        assert_eq!(h.session.state(), ConversationState::Start);
        assert_eq!(h.last_text(), msg_generic_error());

        h.store.set_unavailable(false);
        h.send(CMD_START).await;
        assert_eq!(h.session.state(), ConversationState::TypingPassword);
    }

    #[tokio::test]
    async fn test_non_text_ignored() {
        let mut h = Harness::new();
        let inbound = InboundMessage {
            text: None,
            ..InboundMessage::private_text(CHAT, MessageRef(1), "")
        };
        h.machine
            .handle(&mut h.session, SessionEvent::Inbound(inbound))
            .await;
        assert!(h.transport.sent_messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_expiry_ignored() {
        let mut h = Harness::new();
        h.send(CMD_START).await;
        h.send("Passw0rd").await;
        h.send("Passw0rd").await;

        let stale = h.session.timer_generation().unwrap();
        h.send("menu?").await;
        assert_ne!(h.session.timer_generation(), Some(stale));

        h.machine
            .handle(&mut h.session, SessionEvent::Expired { generation: stale })
            .await;
        assert!(h.session.is_authorized());
        assert_eq!(h.session.state(), ConversationState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lapsed_authorization_expires_on_next_message() {
        let mut h = Harness::new();
        h.send(CMD_START).await;
        h.send("Passw0rd").await;
        h.send("Passw0rd").await;

        tokio::time::advance(Duration::from_secs(31)).await;
        h.send(BTN_RECORD).await;

        assert!(!h.session.is_authorized());
        assert_eq!(h.session.state(), ConversationState::TypingPassword);
        assert_eq!(h.last_text(), msg_session_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_sent_after_lapse_is_deleted() {
        let mut h = Harness::new();
        h.send(CMD_START).await;
        h.send("Passw0rd").await;
        h.send("Passw0rd").await;
        h.send(BTN_RECORD).await;
        assert_eq!(h.session.state(), ConversationState::TypingRecord);

        tokio::time::advance(Duration::from_secs(31)).await;
        let secret = h.send("my bank pin 1234").await;

        assert_eq!(h.session.state(), ConversationState::TypingPassword);
        assert!(h.transport.was_deleted(CHAT, secret));
        assert!(h.store.stored_ciphertexts(CHAT).is_empty());
    }

    async fn send_photo(h: &mut Harness) {
        h.next_id += 1;
        let inbound = InboundMessage {
            text: None,
            ..InboundMessage::private_text(CHAT, MessageRef(h.next_id), "")
        };
        h.machine
            .handle(&mut h.session, SessionEvent::Inbound(inbound))
            .await;
    }

    #[tokio::test]
    async fn test_non_text_while_typing_record_repeats_prompt() {
        let mut h = Harness::new();
        h.send(CMD_START).await;
        h.send("Passw0rd").await;
        h.send("Passw0rd").await;
        h.send(BTN_RECORD).await;
        let sent_before = h.transport.sent_messages().len();

        send_photo(&mut h).await;
        assert_eq!(h.session.state(), ConversationState::TypingRecord);
        assert_eq!(h.transport.sent_messages().len(), sent_before + 1);
        assert_eq!(h.last_text(), msg_type_record());

        h.send("a secret").await;
        send_photo(&mut h).await;
        assert_eq!(h.session.state(), ConversationState::ConfirmingRecord);
        assert_eq!(h.last_text(), msg_choose_save_or_cancel());
        assert_eq!(
            h.transport.last_sent(CHAT).unwrap().keyboard,
            kb_confirm_record()
        );
    }
}
