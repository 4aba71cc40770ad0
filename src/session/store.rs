//! Keyed session store
//!
//! One actor task per chat owns that chat's `Session` and processes its
//! mailbox in order. Ordinary messages and timer expiries share the mailbox,
//! so they are serialized per chat while different chats run concurrently.

use super::machine::SessionMachine;
use super::state::Session;
use super::SessionEvent;
use crate::chat::{ChatId, Transport};
use crate::storage::AccountStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

struct Actor {
    mailbox: mpsc::UnboundedSender<SessionEvent>,
    task: JoinHandle<()>,
}

pub struct SessionStore<S: AccountStore, T: Transport> {
    machine: Arc<SessionMachine<S, T>>,
    actors: HashMap<ChatId, Actor>,
}

impl<S: AccountStore, T: Transport> SessionStore<S, T> {
    pub fn new(machine: SessionMachine<S, T>) -> Self {
        Self {
            machine: Arc::new(machine),
            actors: HashMap::new(),
        }
    }

    /// Queue an event for the chat's actor, spawning it on first contact
    pub fn dispatch(&mut self, chat: ChatId, event: SessionEvent) {
        let machine = &self.machine;
        let actor = self
            .actors
            .entry(chat)
            .or_insert_with(|| spawn_actor(machine.clone(), chat));

        if let Err(mpsc::error::SendError(event)) = actor.mailbox.send(event) {
            // Only a panicked handler closes a mailbox; start a fresh session
            warn!(chat_id = %chat, "Session actor died, restarting");
            let fresh = spawn_actor(self.machine.clone(), chat);
            let _ = fresh.mailbox.send(event);
            self.actors.insert(chat, fresh);
        }
    }

    /// Number of chats with a live session
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Close every mailbox and wait for queued events to finish
    pub async fn shutdown(self) {
        let tasks: Vec<JoinHandle<()>> = self
            .actors
            .into_values()
            .map(|actor| {
                drop(actor.mailbox);
                actor.task
            })
            .collect();

        for task in futures::future::join_all(tasks).await {
            if let Err(e) = task {
                warn!("Session actor failed during shutdown: {}", e);
            }
        }
    }
}

fn spawn_actor<S: AccountStore, T: Transport>(
    machine: Arc<SessionMachine<S, T>>,
    chat: ChatId,
) -> Actor {
    let (mailbox, mut events) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        debug!(chat_id = %chat, "Session actor started");
        let mut session = Session::new(chat);
        while let Some(event) = events.recv().await {
            machine.handle(&mut session, event).await;
        }
        debug!(chat_id = %chat, "Session actor stopped");
    });
    Actor { mailbox, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::messages::*;
    use crate::chat::{InboundMessage, MessageRef, MockTransport};
    use crate::session::{SessionConfig, TimerService};
    use crate::storage::MemoryAccountStore;

    fn store() -> (SessionStore<MemoryAccountStore, MockTransport>, MockTransport) {
        let transport = MockTransport::new();
        let (timers, _expiries) = TimerService::new();
        let machine = SessionMachine::new(
            Arc::new(MemoryAccountStore::new()),
            transport.clone(),
            timers,
            SessionConfig::default(),
        );
        (SessionStore::new(machine), transport)
    }

    fn inbound(chat: ChatId, id: i64, text: &str) -> SessionEvent {
        SessionEvent::Inbound(InboundMessage::private_text(chat, MessageRef(id), text))
    }

    #[tokio::test]
    async fn test_one_actor_per_chat() {
        let (mut sessions, transport) = store();
        sessions.dispatch(ChatId(1), inbound(ChatId(1), 1, CMD_START));
        sessions.dispatch(ChatId(2), inbound(ChatId(2), 1, CMD_START));
        sessions.dispatch(ChatId(1), inbound(ChatId(1), 2, "Passw0rd"));
        assert_eq!(sessions.len(), 2);

        sessions.shutdown().await;

        assert_eq!(
            transport.sent_texts(ChatId(1)),
            vec![msg_welcome_new(), msg_repeat_password()]
        );
        assert_eq!(transport.sent_texts(ChatId(2)), vec![msg_welcome_new()]);
    }

    #[tokio::test]
    async fn test_events_processed_in_order() {
        let (mut sessions, transport) = store();
        let chat = ChatId(3);
        for (id, text) in [(1, CMD_START), (2, "Passw0rd"), (3, "Passw0rd"), (4, BTN_LOGOUT)] {
            sessions.dispatch(chat, inbound(chat, id, text));
        }
        sessions.shutdown().await;

        assert_eq!(transport.sent_texts(chat).last().unwrap(), msg_logged_out());
    }
}
