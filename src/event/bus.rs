//! Event bus - subscription registry and delivery
//!
//! The registry is guarded by a reader/writer lock sized for many concurrent
//! publishes and rare registration changes. Delivery always works from a
//! copied snapshot of the subscriber list, so no lock is ever held while a
//! handler runs, and registration never corrupts an in-flight delivery.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, error};

use super::kind::EventKind;
use super::payload::EventPayload;

/// A subscriber callback.
///
/// Handlers must not assume they run on the publisher's task: async delivery
/// spawns one independent task per handler.
pub type Handler = Arc<dyn Fn(EventKind, &EventPayload) + Send + Sync>;

/// Opaque identity of one subscription, required for removal.
///
/// Callables are not comparable by value, so removal works through this
/// handle (a monotonically increasing id scoped to the subscribed kind)
/// rather than by scanning for a matching handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionHandle {
    kind: EventKind,
    id: u64,
}

impl SubscriptionHandle {
    /// The kind this subscription was registered for
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

struct Subscription {
    id: u64,
    handler: Handler,
}

/// Registry of event kinds to ordered subscriber lists
pub struct EventBus {
    registry: RwLock<HashMap<EventKind, Vec<Subscription>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a handler for a kind.
    ///
    /// Handlers for the same kind are kept in registration order. Returns a
    /// handle identifying exactly this subscription.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionHandle
    where
        F: Fn(EventKind, &EventPayload) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        registry.entry(kind).or_default().push(Subscription {
            id,
            handler: Arc::new(handler),
        });
        debug!("Subscribed handler #{} to event '{}'", id, kind);
        SubscriptionHandle { kind, id }
    }

    /// Remove exactly the subscription identified by the handle.
    ///
    /// No-op if it was already removed.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(subs) = registry.get_mut(&handle.kind) {
            subs.retain(|s| s.id != handle.id);
        }
        debug!("Unsubscribed handler #{} from event '{}'", handle.id, handle.kind);
    }

    /// Remove all subscriptions for a kind
    pub fn clear(&self, kind: EventKind) {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        registry.remove(&kind);
        debug!("Cleared all handlers for event '{}'", kind);
    }

    /// Deliver an event concurrently, without waiting for handlers.
    ///
    /// Each handler runs on its own spawned task; the call returns as soon
    /// as the tasks are scheduled. No ordering between handlers of the same
    /// event is guaranteed, and outstanding tasks may outlive this call -
    /// callers that need "all handlers drained" must use [`publish_sync`].
    /// A panicking handler is caught and logged, never propagated.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// [`publish_sync`]: EventBus::publish_sync
    pub fn publish_async(&self, kind: EventKind, payload: EventPayload) {
        let handlers = self.snapshot(kind);
        if handlers.is_empty() {
            return;
        }

        let count = handlers.len();
        let payload = Arc::new(payload);
        for handler in handlers {
            let payload = Arc::clone(&payload);
            tokio::spawn(async move {
                invoke_guarded(&handler, kind, &payload);
            });
        }
        debug!("Published '{}' to {} handler(s) (async)", kind, count);
    }

    /// Deliver an event sequentially, in registration order.
    ///
    /// Returns only after every handler has completed. A panicking handler
    /// is caught and logged; the remaining handlers still run.
    pub fn publish_sync(&self, kind: EventKind, payload: EventPayload) {
        let handlers = self.snapshot(kind);
        for handler in &handlers {
            invoke_guarded(handler, kind, &payload);
        }
        debug!("Published '{}' to {} handler(s) (sync)", kind, handlers.len());
    }

    /// Number of handlers currently registered for a kind
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry.get(&kind).map_or(0, Vec::len)
    }

    /// All kinds that currently have at least one subscription
    pub fn known_kinds(&self) -> Vec<EventKind> {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry
            .iter()
            .filter(|(_, subs)| !subs.is_empty())
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// Copy the subscriber list for a kind under the read lock
    fn snapshot(&self, kind: EventKind) -> Vec<Handler> {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry
            .get(&kind)
            .map(|subs| subs.iter().map(|s| Arc::clone(&s.handler)).collect())
            .unwrap_or_default()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Invoke a handler, converting a panic into a diagnostic.
///
/// The registry lock is never held here, so a panicking handler cannot
/// poison it or reach the publisher.
fn invoke_guarded(handler: &Handler, kind: EventKind, payload: &EventPayload) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| handler(kind, payload)));
    if let Err(cause) = result {
        let message = cause
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| cause.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        error!("Handler for event '{}' panicked: {}", kind, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    fn counting_handler(counter: Arc<AtomicUsize>) -> impl Fn(EventKind, &EventPayload) {
        move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn wait_for_count(counter: &AtomicUsize, expected: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while counter.load(Ordering::SeqCst) < expected {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("handlers did not run in time");
    }

    #[test]
    fn test_sync_delivery_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for name in ["a", "b", "c"] {
            let order = Arc::clone(&order);
            bus.subscribe(EventKind::SystemInfo, move |_, _| {
                order.lock().unwrap().push(name);
            });
        }

        bus.publish_sync(EventKind::SystemInfo, EventPayload::empty());
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_sync_delivery_survives_panicking_handler() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        {
            let order = Arc::clone(&order);
            bus.subscribe(EventKind::SystemError, move |_, _| {
                order.lock().unwrap().push("first");
            });
        }
        bus.subscribe(EventKind::SystemError, |_, _| panic!("boom"));
        {
            let order = Arc::clone(&order);
            bus.subscribe(EventKind::SystemError, move |_, _| {
                order.lock().unwrap().push("last");
            });
        }

        // Must not propagate the panic and must still reach the last handler
        bus.publish_sync(EventKind::SystemError, EventPayload::empty());
        assert_eq!(*order.lock().unwrap(), vec!["first", "last"]);
    }

    #[test]
    fn test_unsubscribe_removes_exact_subscription() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let keep_a = bus.subscribe(EventKind::ModeChanged, counting_handler(Arc::clone(&hits)));
        let remove = bus.subscribe(EventKind::ModeChanged, |_, _| panic!("should be removed"));
        let keep_b = bus.subscribe(EventKind::ModeChanged, counting_handler(Arc::clone(&hits)));

        assert_eq!(bus.subscriber_count(EventKind::ModeChanged), 3);
        bus.unsubscribe(remove);
        assert_eq!(bus.subscriber_count(EventKind::ModeChanged), 2);

        bus.publish_sync(EventKind::ModeChanged, EventPayload::empty());
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        // Idempotent
        bus.unsubscribe(remove);
        assert_eq!(bus.subscriber_count(EventKind::ModeChanged), 2);

        bus.unsubscribe(keep_a);
        bus.unsubscribe(keep_b);
        assert_eq!(bus.subscriber_count(EventKind::ModeChanged), 0);
    }

    #[test]
    fn test_clear_and_known_kinds() {
        let bus = EventBus::new();
        bus.subscribe(EventKind::ProxyStarted, |_, _| {});
        bus.subscribe(EventKind::ProxyStopped, |_, _| {});

        let mut kinds = bus.known_kinds();
        kinds.sort_by_key(|k| k.as_str());
        assert_eq!(kinds, vec![EventKind::ProxyStarted, EventKind::ProxyStopped]);

        bus.clear(EventKind::ProxyStarted);
        assert_eq!(bus.subscriber_count(EventKind::ProxyStarted), 0);
        assert_eq!(bus.known_kinds(), vec![EventKind::ProxyStopped]);
    }

    #[test]
    fn test_publish_to_unknown_kind_is_noop() {
        let bus = EventBus::new();
        bus.publish_sync(EventKind::ConnectionAdded, EventPayload::empty());
        assert_eq!(bus.subscriber_count(EventKind::ConnectionAdded), 0);
    }

    #[tokio::test]
    async fn test_async_delivery_reaches_all_handlers() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            bus.subscribe(EventKind::TrafficUpdated, counting_handler(Arc::clone(&hits)));
        }

        let payload = EventPayload::builder().set("upload_speed", 42u64).build();
        bus.publish_async(EventKind::TrafficUpdated, payload);

        wait_for_count(&hits, 4).await;
    }

    #[tokio::test]
    async fn test_async_delivery_isolates_panicking_handler() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        bus.subscribe(EventKind::TrafficUpdated, |_, _| panic!("boom"));
        for _ in 0..3 {
            bus.subscribe(EventKind::TrafficUpdated, counting_handler(Arc::clone(&hits)));
        }

        bus.publish_async(EventKind::TrafficUpdated, EventPayload::empty());
        wait_for_count(&hits, 3).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_subscribe_and_publish() {
        let bus = Arc::new(EventBus::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let bus = Arc::clone(&bus);
            let hits = Arc::clone(&hits);
            tasks.push(tokio::spawn(async move {
                for _ in 0..50 {
                    bus.subscribe(EventKind::ConnectionAdded, counting_handler(Arc::clone(&hits)));
                    bus.publish_async(EventKind::ConnectionAdded, EventPayload::empty());
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // 8 * 50 registrations survived the concurrent publishes intact
        assert_eq!(bus.subscriber_count(EventKind::ConnectionAdded), 400);
    }

    #[test]
    fn test_handler_receives_payload() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(None));

        {
            let seen = Arc::clone(&seen);
            bus.subscribe(EventKind::ModeChanged, move |kind, payload| {
                assert_eq!(kind, EventKind::ModeChanged);
                *seen.lock().unwrap() = payload.get_str("new_mode").map(String::from);
            });
        }

        let payload = EventPayload::builder().set("new_mode", "global").build();
        bus.publish_sync(EventKind::ModeChanged, payload);
        assert_eq!(seen.lock().unwrap().as_deref(), Some("global"));
    }
}
