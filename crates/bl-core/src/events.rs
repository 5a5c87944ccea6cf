//! Explicit event bus.
//!
//! The source's event bus was a process-wide mutable singleton. Here it is
//! an explicit value, constructed once and passed into every component that
//! needs to publish or subscribe — no component reaches for global state.
//! Emission iterates a snapshot of subscribers so a concurrent `subscribe`
//! can never invalidate an in-flight iteration.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum LedgerEvent {
    TransactionPending { transaction_hash: String },
    TransactionConfirmed { transaction_hash: String },
    TransactionRejected { transaction_hash: String, reason: String },
    BlockMined { block_index: u64, batch_id: String },
    Consensus { batch_id: String, approvals: u32 },
    TransactionCompleted { transaction_hash: String },
}

impl LedgerEvent {
    fn topic(&self) -> &'static str {
        match self {
            LedgerEvent::TransactionPending { .. } => "transaction_pending",
            LedgerEvent::TransactionConfirmed { .. } => "transaction_confirmed",
            LedgerEvent::TransactionRejected { .. } => "transaction_rejected",
            LedgerEvent::BlockMined { .. } => "block_mined",
            LedgerEvent::Consensus { .. } => "consensus",
            LedgerEvent::TransactionCompleted { .. } => "transaction_completed",
        }
    }
}

type Subscriber = Arc<dyn Fn(&LedgerEvent) + Send + Sync>;

#[derive(Default, Clone)]
pub struct EventBus {
    subscribers: Arc<Mutex<HashMap<&'static str, Vec<Subscriber>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a single topic name (see `LedgerEvent::topic`).
    pub fn subscribe<F>(&self, topic: &'static str, handler: F)
    where
        F: Fn(&LedgerEvent) + Send + Sync + 'static,
    {
        let mut subs = self.subscribers.lock().expect("event bus mutex poisoned");
        subs.entry(topic).or_default().push(Arc::new(handler));
    }

    /// Publish an event to all subscribers of its topic. Takes a snapshot of
    /// the subscriber list before invoking handlers.
    pub fn publish(&self, event: LedgerEvent) {
        let topic = event.topic();
        let snapshot: Vec<Subscriber> = {
            let subs = self.subscribers.lock().expect("event bus mutex poisoned");
            subs.get(topic).cloned().unwrap_or_default()
        };
        debug!(topic, subscriber_count = snapshot.len(), "publishing event");
        for handler in &snapshot {
            handler(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn subscribers_receive_published_events() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        bus.subscribe("block_mined", move |_e| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        bus.publish(LedgerEvent::BlockMined {
            block_index: 1,
            batch_id: "B1".into(),
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscribe_during_publish_does_not_panic() {
        let bus = EventBus::new();
        let bus2 = bus.clone();
        bus.subscribe("consensus", move |_e| {
            bus2.subscribe("consensus", |_e| {});
        });
        bus.publish(LedgerEvent::Consensus {
            batch_id: "B1".into(),
            approvals: 10,
        });
    }
}
