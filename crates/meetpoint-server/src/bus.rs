//! In-process publish/subscribe channel for scheduling events.
//!
//! The bus delivers each published event to every observer subscribed at
//! publish time. There is no backlog and no replay: an observer connecting
//! after a publish never sees it. Membership changes are atomic with respect
//! to a publish — an observer added mid-publish does not receive that event,
//! one removed mid-publish cannot.
//!
//! One bus instance lives for the process: created at service start, torn
//! down at shutdown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::{debug, trace};

use meetpoint_core::NotificationEvent;

/// Identifier assigned to an observer at subscribe time.
pub type ObserverId = u64;

#[derive(Debug, Default)]
struct Registry {
    next_id: ObserverId,
    observers: HashMap<ObserverId, mpsc::UnboundedSender<NotificationEvent>>,
}

/// The publish/subscribe channel.
///
/// Cheap to clone; clones share the same observer registry. Publishing
/// enqueues per observer and never waits on a slow or failed one, so a
/// single misbehaving observer cannot affect its peers or the publisher.
/// Per observer, events arrive in publish order.
#[derive(Debug, Clone, Default)]
pub struct NotificationBus {
    registry: Arc<Mutex<Registry>>,
}

impl NotificationBus {
    /// Creates a bus with no observers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a live observer.
    ///
    /// No backlog is delivered: only events published after this call reach
    /// the new observer.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.observers.insert(id, tx);
        debug!(observer_id = id, "observer subscribed");
        Subscription {
            id,
            receiver: rx,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Removes an observer.
    ///
    /// Idempotent: unknown or already-removed ids are ignored, so calling
    /// this after the observer has disconnected is safe.
    pub fn unsubscribe(&self, id: ObserverId) {
        let mut registry = self.lock();
        if registry.observers.remove(&id).is_some() {
            debug!(observer_id = id, "observer unsubscribed");
        }
    }

    /// Delivers an event to every observer subscribed at call time.
    ///
    /// Observers whose receiving side is gone are pruned without affecting
    /// the rest of the delivery. Returns the number of observers reached.
    pub fn publish(&self, event: &NotificationEvent) -> usize {
        let mut registry = self.lock();
        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, sender) in &registry.observers {
            if sender.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*id);
            }
        }
        for id in dead {
            registry.observers.remove(&id);
            debug!(observer_id = id, "pruned disconnected observer");
        }
        trace!(delivered, kind = ?event.kind, "event published");
        delivered
    }

    /// Number of currently subscribed observers.
    pub fn observer_count(&self) -> usize {
        self.lock().observers.len()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().expect("observer registry poisoned")
    }
}

/// A live subscription handle.
///
/// Dropping the handle unsubscribes the observer; in-flight events already
/// enqueued for it are discarded with the receiver.
pub struct Subscription {
    id: ObserverId,
    receiver: mpsc::UnboundedReceiver<NotificationEvent>,
    registry: Arc<Mutex<Registry>>,
}

impl Subscription {
    /// The observer id assigned at subscribe time.
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Receives the next event, in publish order.
    ///
    /// Returns `None` once the observer has been unsubscribed and the
    /// already-delivered backlog is drained.
    pub async fn recv(&mut self) -> Option<NotificationEvent> {
        self.receiver.recv().await
    }

    /// Non-blocking receive, for callers draining after a known publish.
    pub fn try_recv(&mut self) -> Option<NotificationEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Ok(mut registry) = self.registry.lock() {
            registry.observers.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meetpoint_core::{EventKind, NotificationEvent};

    fn event(payload: &str) -> NotificationEvent {
        NotificationEvent::new(EventKind::MeetingScheduled, "owner@example.com", payload)
    }

    #[tokio::test]
    async fn delivers_in_publish_order() {
        let bus = NotificationBus::new();
        let mut sub = bus.subscribe();

        bus.publish(&event("one"));
        bus.publish(&event("two"));
        bus.publish(&event("three"));

        assert_eq!(sub.recv().await.unwrap().payload, "one");
        assert_eq!(sub.recv().await.unwrap().payload, "two");
        assert_eq!(sub.recv().await.unwrap().payload, "three");
    }

    #[tokio::test]
    async fn no_backlog_for_late_subscribers() {
        let bus = NotificationBus::new();
        bus.publish(&event("before anyone connected"));

        let mut sub = bus.subscribe();
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn delivers_to_the_then_current_observer_set() {
        let bus = NotificationBus::new();
        let mut first = bus.subscribe();

        assert_eq!(bus.publish(&event("e1")), 1);
        let mut second = bus.subscribe();
        assert_eq!(bus.publish(&event("e2")), 2);

        assert_eq!(first.recv().await.unwrap().payload, "e1");
        assert_eq!(first.recv().await.unwrap().payload, "e2");
        // The late subscriber only sees the second event.
        assert_eq!(second.recv().await.unwrap().payload, "e2");
        assert!(second.try_recv().is_none());
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let bus = NotificationBus::new();
        let sub = bus.subscribe();
        let id = sub.id();

        bus.unsubscribe(id);
        bus.unsubscribe(id);
        assert_eq!(bus.observer_count(), 0);
        assert_eq!(bus.publish(&event("ignored")), 0);
    }

    #[tokio::test]
    async fn unsubscribed_observer_stops_receiving() {
        let bus = NotificationBus::new();
        let mut sub = bus.subscribe();

        bus.publish(&event("delivered"));
        bus.unsubscribe(sub.id());
        bus.publish(&event("after removal"));

        assert_eq!(sub.recv().await.unwrap().payload, "delivered");
        // The sender is gone, so the stream ends after the drained backlog.
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn dropping_the_subscription_unsubscribes() {
        let bus = NotificationBus::new();
        let sub = bus.subscribe();
        assert_eq!(bus.observer_count(), 1);

        drop(sub);
        assert_eq!(bus.observer_count(), 0);
        assert_eq!(bus.publish(&event("nobody home")), 0);
    }

    #[tokio::test]
    async fn dropped_receiver_is_pruned_on_publish() {
        let bus = NotificationBus::new();
        let _live = bus.subscribe();

        // An observer whose receiving side vanished without unsubscribing.
        let dead_id = {
            let (tx, rx) = mpsc::unbounded_channel();
            drop(rx);
            let mut registry = bus.registry.lock().unwrap();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.observers.insert(id, tx);
            id
        };

        assert_eq!(bus.observer_count(), 2);
        // Publish reaches only the live observer and prunes the dead one.
        assert_eq!(bus.publish(&event("still flows")), 1);
        assert_eq!(bus.observer_count(), 1);
        assert!(!bus.registry.lock().unwrap().observers.contains_key(&dead_id));
    }

    #[tokio::test]
    async fn publish_never_blocks_without_consumers() {
        let bus = NotificationBus::new();
        let mut sub = bus.subscribe();

        // A slow observer that never drains must not slow the publisher.
        for i in 0..1000 {
            bus.publish(&event(&format!("event-{i}")));
        }

        assert_eq!(sub.recv().await.unwrap().payload, "event-0");
        let mut last = String::new();
        while let Some(e) = sub.try_recv() {
            last = e.payload;
        }
        assert_eq!(last, "event-999");
    }

    #[tokio::test]
    async fn concurrent_subscribers_each_get_every_event() {
        let bus = NotificationBus::new();
        let subs: Vec<_> = (0..3).map(|_| bus.subscribe()).collect();
        assert_eq!(bus.observer_count(), 3);

        assert_eq!(bus.publish(&event("fan out")), 3);

        for mut sub in subs {
            assert_eq!(sub.recv().await.unwrap().payload, "fan out");
        }
    }
}
