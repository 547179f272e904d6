// SPDX-License-Identifier: MIT

//! Event Bus (§4.1): in-process pub/sub over bounded subscriber queues,
//! backed by a persisted audit trail in the store.
//!
//! The subscriber-set mutation is serialized by a `parking_lot::Mutex`
//! (§5); the lock is dropped before delivery, which is otherwise
//! lock-free. Delivery is non-blocking: a full queue drops the event for
//! that subscriber and logs a warning, with no backpressure to the emitter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use taskforge_core::{EntityType, Event, EventType, TimeSource};
use taskforge_storage::Store;

/// A live subscription: drop it (or call [`EventBus::unsubscribe`]) to stop
/// receiving.
pub struct Subscription {
    pub id: u64,
    pub receiver: mpsc::Receiver<Event>,
}

struct Subscriber {
    id: u64,
    sender: mpsc::Sender<Event>,
}

/// Process-wide pub/sub. Cheaply `Clone`-able (the inner state is `Arc`'d).
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn Store>,
    clock: Arc<dyn TimeSource>,
    subscribers: Mutex<HashMap<String, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn TimeSource>) -> Self {
        Self { inner: Arc::new(Inner { store, clock, subscribers: Mutex::new(HashMap::new()), next_id: AtomicU64::new(1) }) }
    }

    /// Subscribe to one event type, or `"*"` for every event.
    pub fn subscribe(&self, event_type: &str, maxsize: usize) -> Subscription {
        let (tx, rx) = mpsc::channel(maxsize.max(1));
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().entry(event_type.to_string()).or_default().push(Subscriber { id, sender: tx });
        Subscription { id, receiver: rx }
    }

    /// Remove a subscription's queue from `event_type`'s subscriber set.
    pub fn unsubscribe(&self, subscription_id: u64, event_type: &str) {
        let mut subs = self.inner.subscribers.lock();
        if let Some(list) = subs.get_mut(event_type) {
            list.retain(|s| s.id != subscription_id);
        }
    }

    /// Persist `event` (log-and-continue on store failure) and deliver it to
    /// every subscriber of its own type plus every wildcard subscriber, in
    /// that order, preserving emission order per queue.
    pub async fn emit(&self, event_type: EventType, entity_type: EntityType, entity_id: Option<String>, payload: Value) {
        let event = Event::new(event_type, entity_type, entity_id, payload, self.inner.clock.as_ref());
        self.emit_event(event).await;
    }

    async fn emit_event(&self, event: Event) {
        if let Err(e) = self.inner.store.append_event(event.clone()).await {
            tracing::warn!(error = %e, event_type = %event.event_type, "failed to persist event, continuing");
        }

        let targets: Vec<mpsc::Sender<Event>> = {
            let subs = self.inner.subscribers.lock();
            let mut targets = Vec::new();
            if let Some(list) = subs.get(event.event_type.as_str()) {
                targets.extend(list.iter().map(|s| s.sender.clone()));
            }
            if let Some(list) = subs.get("*") {
                targets.extend(list.iter().map(|s| s.sender.clone()));
            }
            targets
        };

        for tx in targets {
            if tx.try_send(event.clone()).is_err() {
                tracing::warn!(event_type = %event.event_type, "subscriber queue full or closed, dropping event");
            }
        }
    }
}
