//! Inbound router
//!
//! Selects over the transport's inbound channel and the timer expiry channel.
//! Non-private chats are left without touching any session; private chats
//! are dispatched to their session actor.

use super::traits::{ChatKind, InboundMessage, Transport};
use crate::session::{
    SessionConfig, SessionEvent, SessionMachine, SessionStore, TimerExpired, TimerService,
};
use crate::storage::AccountStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{info, warn};

pub struct Router<S: AccountStore, T: Transport> {
    transport: T,
    sessions: SessionStore<S, T>,
    inbound: mpsc::Receiver<InboundMessage>,
    expiries: mpsc::UnboundedReceiver<TimerExpired>,
    /// Group leaves in flight; a slow Bot API call must not block routing
    leaving: JoinSet<()>,
}

impl<S: AccountStore, T: Transport> Router<S, T> {
    pub fn new(
        store: Arc<S>,
        transport: T,
        config: SessionConfig,
        inbound: mpsc::Receiver<InboundMessage>,
    ) -> Self {
        let (timers, expiries) = TimerService::new();
        let machine = SessionMachine::new(store, transport.clone(), timers, config);
        Self {
            transport,
            sessions: SessionStore::new(machine),
            inbound,
            expiries,
            leaving: JoinSet::new(),
        }
    }

    /// Run until the inbound channel closes, then drain every session
    pub async fn run(mut self) {
        info!("Router started");
        loop {
            tokio::select! {
                message = self.inbound.recv() => match message {
                    Some(message) => self.route(message),
                    None => {
                        info!("Inbound channel closed, stopping router");
                        break;
                    }
                },
                Some(expired) = self.expiries.recv() => {
                    self.sessions.dispatch(
                        expired.chat,
                        SessionEvent::Expired { generation: expired.generation },
                    );
                }
            }
        }
        self.sessions.shutdown().await;
        while self.leaving.join_next().await.is_some() {}
        info!("Router stopped");
    }

    fn route(&mut self, message: InboundMessage) {
        while self.leaving.try_join_next().is_some() {}

        if message.kind != ChatKind::Private {
            let chat = message.chat;
            warn!(chat_id = %chat, "Message from non-private chat, leaving");
            let transport = self.transport.clone();
            self.leaving.spawn(async move {
                if let Err(e) = transport.leave(chat).await {
                    warn!(chat_id = %chat, "Failed to leave chat: {}", e);
                }
            });
            return;
        }
        self.sessions.dispatch(message.chat, SessionEvent::Inbound(message));
    }
}
