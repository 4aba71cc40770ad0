//! Record browsing
//!
//! The overview is fetched once when browsing starts and paged from that
//! snapshot. Sending a record number decrypts it with the session key.

use super::machine::SessionMachine;
use super::state::{BrowseView, Conversation, Session};
use crate::chat::messages::*;
use crate::chat::Transport;
use crate::storage::AccountStore;
use chrono::{DateTime, Local, Utc};
use tracing::warn;

const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Render a unix timestamp in local time
pub fn format_timestamp(unix_seconds: i64) -> String {
    DateTime::<Utc>::from_timestamp(unix_seconds, 0)
        .map(|utc| utc.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| unix_seconds.to_string())
}

impl<S: AccountStore, T: Transport> SessionMachine<S, T> {
    pub(super) async fn open_browser(&self, session: &mut Session) {
        match self.store.records_overview(session.chat).await {
            Ok(records) if records.is_empty() => {
                self.reply(session, msg_no_records(), kb_main_menu()).await;
            }
            Ok(records) => {
                session.conversation = Conversation::Browsing(BrowseView::new(records));
                self.render_page(session).await;
            }
            Err(e) => {
                warn!(chat_id = %session.chat, "Failed to list records: {}", e);
                self.reply_error(session, kb_main_menu()).await;
            }
        }
    }

    pub(super) async fn browse_input(&self, session: &mut Session, input: &str) {
        let page_size = self.config.browse_page_size;
        let Conversation::Browsing(view) = &mut session.conversation else {
            return;
        };

        match input {
            BTN_PAGE_NEXT => view.next_page(page_size),
            BTN_PAGE_PREV => view.prev_page(),
            BTN_BACK => {
                session.conversation = Conversation::Idle;
                self.reply(session, msg_main_menu(), kb_main_menu()).await;
                return;
            }
            _ => {
                if let Ok(number) = input.parse::<usize>() {
                    self.view_record(session, number).await;
                    return;
                }
            }
        }
        self.render_page(session).await;
    }

    async fn render_page(&self, session: &mut Session) {
        let page_size = self.config.browse_page_size;
        let Conversation::Browsing(view) = &session.conversation else {
            return;
        };

        let entries: Vec<(usize, String, u64)> = view
            .page_entries(page_size)
            .map(|(number, record)| (number, format_timestamp(record.created_at), record.size))
            .collect();
        let text = msg_browse_page(&entries, view.page, view.page_count(page_size));
        let keyboard = kb_browse(view.has_prev(), view.has_next(page_size));

        self.reply(session, &text, keyboard).await;
    }

    /// Decrypt and show one record; the reply is tracked for purging
    async fn view_record(&self, session: &mut Session, number: usize) {
        let page_size = self.config.browse_page_size;
        let Conversation::Browsing(view) = &session.conversation else {
            return;
        };
        let keyboard = kb_browse(view.has_prev(), view.has_next(page_size));
        let Some(record) = view.record(number).cloned() else {
            self.reply(session, &msg_record_not_found(number), keyboard).await;
            return;
        };

        let ciphertext = match self.store.record_ciphertext(session.chat, record.id).await {
            Ok(Some(ciphertext)) => ciphertext,
            Ok(None) => {
                self.reply(session, &msg_record_not_found(number), keyboard).await;
                return;
            }
            Err(e) => {
                warn!(chat_id = %session.chat, "Failed to load record: {}", e);
                self.reply_error(session, keyboard).await;
                return;
            }
        };

        let opened = match session.cipher() {
            Some(cipher) => cipher.decrypt(&ciphertext),
            None => {
                warn!(chat_id = %session.chat, "No record key while browsing");
                self.reply_error(session, keyboard).await;
                return;
            }
        };

        match opened {
            Ok(plaintext) => {
                let content = String::from_utf8_lossy(&plaintext);
                let text = msg_record_view(number, &format_timestamp(record.created_at), &content);
                self.reply(session, &text, keyboard).await;
            }
            Err(e) => {
                warn!(chat_id = %session.chat, record = record.id, "Failed to decrypt record: {}", e);
                self.reply_error(session, keyboard).await;
            }
        }
    }
}
