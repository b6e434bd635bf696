//! Login state notifications for the UI layer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc;

/// A session-state transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthEvent {
    /// A login was started; the UI may show a loading state.
    LoginCheck,
    /// An authorization callback produced a new session.
    LoginSuccess,
    /// The user became logged in or logged out.
    LoginStateChanged { logged_in: bool },
}

impl AuthEvent {
    /// Event name used by host bridges that dispatch by string.
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::LoginCheck => "authLoginCheck",
            AuthEvent::LoginSuccess => "authLoginSuccess",
            AuthEvent::LoginStateChanged { .. } => "authLoginChange",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&AuthEvent) + Send + Sync>;

/// Synchronous in-process publish/subscribe.
///
/// Every listener registered when `publish` is called runs before it returns.
/// Events are not stored or replayed.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<RwLock<Vec<(SubscriptionId, Listener)>>>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Subscribe a channel instead of a callback, for async consumers.
    pub fn channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<AuthEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe(move |event| {
            // Receiver dropped: nothing left to deliver to
            let _ = tx.send(*event);
        });
        (id, rx)
    }

    pub fn publish(&self, event: AuthEvent) {
        // Snapshot so listeners may subscribe or unsubscribe while being called
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        tracing::debug!(event = event.name(), listeners = listeners.len(), "Publishing auth event");
        for listener in listeners {
            listener(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_publish_reaches_all_listeners() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b"] {
            let seen = seen.clone();
            bus.subscribe(move |event| seen.lock().push((tag, *event)));
        }

        bus.publish(AuthEvent::LoginSuccess);
        assert_eq!(
            *seen.lock(),
            vec![("a", AuthEvent::LoginSuccess), ("b", AuthEvent::LoginSuccess)]
        );
    }

    #[test]
    fn test_publish_without_listeners() {
        EventBus::new().publish(AuthEvent::LoginCheck);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let id = bus.subscribe(|_| panic!("unsubscribed listener called"));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(AuthEvent::LoginCheck);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_listener_may_subscribe_during_publish() {
        let bus = EventBus::new();
        let inner = bus.clone();
        bus.subscribe(move |_| {
            inner.subscribe(|_| {});
        });
        bus.publish(AuthEvent::LoginCheck);
        assert_eq!(bus.listener_count(), 2);
    }

    #[tokio::test]
    async fn test_channel_receives_events_in_order() {
        let bus = EventBus::new();
        let (_id, mut rx) = bus.channel();

        bus.publish(AuthEvent::LoginCheck);
        bus.publish(AuthEvent::LoginStateChanged { logged_in: false });

        assert_eq!(rx.recv().await, Some(AuthEvent::LoginCheck));
        assert_eq!(
            rx.recv().await,
            Some(AuthEvent::LoginStateChanged { logged_in: false })
        );
    }

    #[test]
    fn test_event_names() {
        assert_eq!(AuthEvent::LoginCheck.name(), "authLoginCheck");
        assert_eq!(AuthEvent::LoginSuccess.name(), "authLoginSuccess");
        assert_eq!(
            AuthEvent::LoginStateChanged { logged_in: true }.name(),
            "authLoginChange"
        );
    }
}
