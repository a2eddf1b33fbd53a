//! Cancellable deferred messages.
//!
//! Every timer is a spawned sleep that posts one message back into its
//! owner's mailbox through a weak sender, so pending timers never keep the
//! mailbox open. The registry keeps each task's handle until the timer
//! fires or is cancelled; dropping the registry aborts whatever is left.

use std::collections::HashMap;
use std::time::Duration;

use actrouter_core::TimerId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct TimerRegistry {
    next_id: TimerId,
    handles: HashMap<TimerId, JoinHandle<()>>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post `make(id)` to `loopback` after `delay`. Returns the timer id.
    ///
    /// If the mailbox is gone by the time the timer fires, the message is
    /// dropped.
    pub fn schedule<M, F>(&mut self, delay: Duration, loopback: &mpsc::WeakSender<M>, make: F) -> TimerId
    where
        M: Send + 'static,
        F: FnOnce(TimerId) -> M + Send + 'static,
    {
        self.next_id += 1;
        let id = self.next_id;
        let loopback = loopback.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = loopback.upgrade() {
                let _ = tx.send(make(id)).await;
            }
        });
        self.handles.insert(id, handle);
        id
    }

    /// Forget a timer whose message has been received.
    pub fn forget(&mut self, id: TimerId) -> bool {
        self.handles.remove(&id).is_some()
    }

    /// Abort a pending timer. Returns `false` if it was unknown.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.handles.remove(&id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Abort every pending timer. Returns how many were aborted.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.handles.len();
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
        count
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Drop for TimerRegistry {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let (tx, mut rx) = mpsc::channel::<TimerId>(8);
        let mut timers = TimerRegistry::new();
        let id = timers.schedule(Duration::from_millis(100), &tx.downgrade(), |id| id);

        tokio::time::sleep(Duration::from_millis(99)).await;
        assert!(rx.try_recv().is_err(), "must not fire early");

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(rx.recv().await, Some(id));
        assert!(timers.forget(id));
        assert!(timers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let (tx, mut rx) = mpsc::channel::<TimerId>(8);
        let mut timers = TimerRegistry::new();
        let id = timers.schedule(Duration::from_millis(50), &tx.downgrade(), |id| id);
        assert!(timers.cancel(id));
        assert!(!timers.cancel(id));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_and_drop_abort_everything() {
        let (tx, mut rx) = mpsc::channel::<TimerId>(8);
        let mut timers = TimerRegistry::new();
        for delay in [10, 20, 30] {
            timers.schedule(Duration::from_millis(delay), &tx.downgrade(), |id| id);
        }
        assert_eq!(timers.cancel_all(), 3);

        let mut dropped = TimerRegistry::new();
        dropped.schedule(Duration::from_millis(10), &tx.downgrade(), |id| id);
        drop(dropped);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn weak_sender_does_not_keep_mailbox_open() {
        let (tx, mut rx) = mpsc::channel::<TimerId>(8);
        let mut timers = TimerRegistry::new();
        timers.schedule(Duration::from_secs(60), &tx.downgrade(), |id| id);
        drop(tx);
        assert_eq!(rx.recv().await, None);
    }
}
