//! Subscription bus (C9, §4.9): non-blocking, capacity-1 notification
//! channels so a burst of consensus changes coalesces into a single
//! pending wake-up per subscriber instead of backing up a queue.

use parking_lot::Mutex;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};

pub struct SubscriptionBus {
    subscribers: Mutex<Vec<SyncSender<()>>>,
}

impl SubscriptionBus {
    pub fn new() -> Self {
        SubscriptionBus { subscribers: Mutex::new(Vec::new()) }
    }

    /// Registers a new subscriber, returning its receiving end.
    pub fn subscribe(&self) -> Receiver<()> {
        let (tx, rx) = sync_channel(1);
        self.subscribers.lock().push(tx);
        rx
    }

    /// Notifies every live subscriber. A full channel means the subscriber
    /// already has a pending wake-up, so the drop is intentional; a
    /// disconnected one is pruned.
    pub fn notify_all(&self) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| match tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Disconnected(())) => false,
        });
    }
}

impl Default for SubscriptionBus {
    fn default() -> Self {
        Self::new()
    }
}
