//! Inactivity timers
//!
//! A timer is a sleeping task that, on expiry, posts `TimerExpired` to the
//! router instead of touching the session. Each arm gets a fresh generation;
//! the session only honours an expiry whose generation matches the handle it
//! still holds, so an expiry racing a rearm is dropped.

use crate::chat::ChatId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Expiry notification routed back to the owning session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerExpired {
    pub chat: ChatId,
    pub generation: u64,
}

/// Schedules one-shot expiry notifications
#[derive(Clone)]
pub struct TimerService {
    expiry_tx: mpsc::UnboundedSender<TimerExpired>,
    next_generation: Arc<AtomicU64>,
}

impl TimerService {
    /// Create the service and the receiver the router drains
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerExpired>) {
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        let service = Self {
            expiry_tx,
            next_generation: Arc::new(AtomicU64::new(0)),
        };
        (service, expiry_rx)
    }

    /// Schedule an expiry for `chat` after `delay`
    pub fn arm(&self, chat: ChatId, delay: Duration) -> TimerHandle {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let expiry_tx = self.expiry_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the router shut down
            let _ = expiry_tx.send(TimerExpired { chat, generation });
        });
        TimerHandle { generation, task }
    }
}

/// Ownership of one armed timer
///
/// Dropping the handle cancels the timer.
#[derive(Debug)]
pub struct TimerHandle {
    generation: u64,
    task: JoinHandle<()>,
}

impl TimerHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Cancel the timer; a no-op if it already fired or was cancelled
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// True once the timer fired or its cancellation took effect
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAT: ChatId = ChatId(9);

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let (timers, mut expiries) = TimerService::new();
        let handle = timers.arm(CHAT, Duration::from_secs(30));
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(29)).await;
        tokio::task::yield_now().await;
        assert!(expiries.try_recv().is_err());

        let expired = expiries.recv().await.unwrap();
        assert_eq!(expired, TimerExpired { chat: CHAT, generation: handle.generation() });
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_many_times_fires_once() {
        let (timers, mut expiries) = TimerService::new();

        let mut handle: Option<TimerHandle> = None;
        for _ in 0..5 {
            if let Some(previous) = handle.take() {
                previous.cancel();
            }
            handle = Some(timers.arm(CHAT, Duration::from_secs(30)));
            tokio::time::advance(Duration::from_secs(10)).await;
        }
        let last = handle.as_ref().unwrap().generation();

        let expired = expiries.recv().await.unwrap();
        assert_eq!(expired.generation, last);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(expiries.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let (timers, mut expiries) = TimerService::new();

        // Cancelled twice before firing
        let handle = timers.arm(CHAT, Duration::from_secs(5));
        handle.cancel();
        handle.cancel();

        // Cancelled after firing
        let fired = timers.arm(CHAT, Duration::from_secs(1));
        let expired = expiries.recv().await.unwrap();
        assert_eq!(expired.generation, fired.generation());
        fired.cancel();
        fired.cancel();
        assert!(fired.is_finished());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(expiries.try_recv().is_err());
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let (timers, mut expiries) = TimerService::new();
        drop(timers.arm(CHAT, Duration::from_secs(5)));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(expiries.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_generations_increase() {
        let (timers, _expiries) = TimerService::new();
        let a = timers.arm(CHAT, Duration::from_secs(60));
        let b = timers.arm(ChatId(10), Duration::from_secs(60));
        assert!(b.generation() > a.generation());
    }
}
