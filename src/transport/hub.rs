//! Listener registry shared by transports
//!
//! Replaces `.on/.off` style callbacks: a listener is an mpsc sender, and the
//! returned [`Subscription`] detaches it when dropped.

use super::TransportEvent;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;

/// Fan-out of transport events to subscribed listeners
#[derive(Default)]
pub struct EventHub {
    listeners: Mutex<BTreeMap<u64, mpsc::Sender<TransportEvent>>>,
    next_id: AtomicU64,
}

impl EventHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscribe(self: &Arc<Self>, sink: mpsc::Sender<TransportEvent>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, sink);
        Subscription {
            hub: Arc::downgrade(self),
            id: Some(id),
        }
    }

    /// Deliver an event to every listener, in subscription order.
    ///
    /// Waits for channel capacity so no listener observes a reordered or
    /// truncated stream. Listeners whose receiver is gone are pruned.
    /// Returns how many listeners received the event.
    pub async fn emit(&self, event: TransportEvent) -> usize {
        let listeners: Vec<(u64, mpsc::Sender<TransportEvent>)> = self
            .lock()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut delivered = 0;
        for (id, tx) in listeners {
            if tx.send(event.clone()).await.is_ok() {
                delivered += 1;
            } else {
                tracing::debug!(listener = id, "Dropping closed transport listener");
                self.remove(id);
            }
        }
        delivered
    }

    #[cfg(test)]
    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn remove(&self, id: u64) {
        self.lock().remove(&id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<u64, mpsc::Sender<TransportEvent>>> {
        // A poisoned map is still structurally valid
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Disposable handle for one listener
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    hub: Weak<EventHub>,
    id: Option<u64>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let (Some(id), Some(hub)) = (self.id.take(), self.hub.upgrade()) {
            hub.remove(id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
