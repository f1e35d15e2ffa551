//! Synchronous in-process event bus.
//!
//! [`EventBus::fire`] runs every matching listener on the calling thread, in
//! registration order, before it returns. Listeners registered for
//! [`MATCH_ALL`] run first and see every event. The registry lock is released
//! before any listener runs, so listeners may fire events, subscribe or
//! unsubscribe freely.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use homecore_domain::event::{Event, EventData, MATCH_ALL};
use parking_lot::Mutex;

use crate::worker_pool::panic_message;

/// Callback invoked for each matching event.
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Identifies one registration on a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone)]
struct Registration {
    id: ListenerId,
    event_type: String,
    listener: Listener,
    /// Set for one-shot listeners; flips to `true` on first delivery.
    fired: Option<Arc<AtomicBool>>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<String, Vec<Registration>>,
}

impl Registry {
    fn remove(&mut self, event_type: &str, id: ListenerId) -> bool {
        let Some(registrations) = self.listeners.get_mut(event_type) else {
            return false;
        };
        let before = registrations.len();
        registrations.retain(|reg| reg.id != id);
        let removed = registrations.len() != before;
        if registrations.is_empty() {
            self.listeners.remove(event_type);
        }
        removed
    }
}

/// Handle returned by [`EventBus::listen`] and [`EventBus::listen_once`].
///
/// Dropping the handle keeps the listener registered.
#[derive(Debug, Clone)]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    event_type: String,
    id: ListenerId,
}

impl Subscription {
    /// Remove exactly this registration. Calling it again, or after a
    /// one-shot listener already fired, does nothing.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().remove(&self.event_type, self.id);
        }
    }

    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }
}

/// Publish/subscribe dispatcher keyed by event type.
#[derive(Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a persistent listener for `event_type` (or [`MATCH_ALL`]).
    pub fn listen(
        &self,
        event_type: &str,
        listener: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Subscription {
        self.register(event_type, Arc::new(listener), false)
    }

    /// Register a listener that is removed after its first invocation.
    ///
    /// Delivery happens at most once even when several threads fire the
    /// event concurrently.
    pub fn listen_once(
        &self,
        event_type: &str,
        listener: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Subscription {
        self.register(event_type, Arc::new(listener), true)
    }

    fn register(&self, event_type: &str, listener: Listener, once: bool) -> Subscription {
        let mut registry = self.registry.lock();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry
            .listeners
            .entry(event_type.to_string())
            .or_default()
            .push(Registration {
                id,
                event_type: event_type.to_string(),
                listener,
                fired: once.then(|| Arc::new(AtomicBool::new(false))),
            });
        tracing::trace!(event_type, listener = %id, once, "listener registered");

        Subscription {
            registry: Arc::downgrade(&self.registry),
            event_type: event_type.to_string(),
            id,
        }
    }

    /// Remove a registration. Unknown registrations are ignored.
    ///
    /// Returns whether something was removed.
    pub fn remove_listener(&self, event_type: &str, id: ListenerId) -> bool {
        self.registry.lock().remove(event_type, id)
    }

    /// Number of listeners per event type.
    #[must_use]
    pub fn listeners(&self) -> HashMap<String, usize> {
        self.registry
            .lock()
            .listeners
            .iter()
            .map(|(event_type, regs)| (event_type.clone(), regs.len()))
            .collect()
    }

    /// Fire a local event stamped now.
    pub fn fire(&self, event_type: &str, data: impl Into<EventData>) {
        self.fire_event(Event::new(event_type, data));
    }

    /// Dispatch an already-built event, e.g. one received from elsewhere.
    pub fn fire_event(&self, event: Event) {
        let targets: Vec<Registration> = {
            let registry = self.registry.lock();
            let match_all = registry.listeners.get(MATCH_ALL).into_iter().flatten();
            let exact = if event.event_type() == MATCH_ALL {
                None
            } else {
                registry.listeners.get(event.event_type())
            };
            match_all.chain(exact.into_iter().flatten()).cloned().collect()
        };

        tracing::trace!(event = %event, listeners = targets.len(), "firing event");

        for reg in targets {
            if let Some(fired) = &reg.fired {
                if fired.swap(true, Ordering::SeqCst) {
                    continue;
                }
                self.registry.lock().remove(&reg.event_type, reg.id);
            }

            let listener = &reg.listener;
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                tracing::error!(
                    event_type = event.event_type(),
                    listener = %reg.id,
                    panic = panic_message(payload.as_ref()),
                    "listener panicked"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homecore_domain::event::Origin;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn counter(bus: &EventBus, event_type: &str) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        let sub = bus.listen(event_type, move |_| {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        (count, sub)
    }

    #[test]
    fn should_invoke_every_listener_of_fired_type_only() {
        let bus = EventBus::new();
        let (a, _) = counter(&bus, "ping");
        let (b, _) = counter(&bus, "ping");
        let (other, _) = counter(&bus, "pong");

        bus.fire("ping", EventData::empty());

        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
        assert_eq!(other.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn should_invoke_listeners_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..4 {
            let order = Arc::clone(&order);
            bus.listen("ping", move |_| order.lock().push(i));
        }

        bus.fire("ping", EventData::empty());

        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn should_keep_dispatching_when_a_listener_panics() {
        let bus = EventBus::new();
        let (before, _) = counter(&bus, "ping");
        bus.listen("ping", |_| panic!("listener failure"));
        let (after, _) = counter(&bus, "ping");

        bus.fire("ping", EventData::empty());
        bus.fire("ping", EventData::empty());

        assert_eq!(before.load(Ordering::SeqCst), 2);
        assert_eq!(after.load(Ordering::SeqCst), 2);
        assert_eq!(bus.listeners().get("ping"), Some(&3));
    }

    #[test]
    fn should_stop_delivering_after_unsubscribe() {
        let bus = EventBus::new();
        let (count, sub) = counter(&bus, "ping");

        bus.fire("ping", EventData::empty());
        sub.unsubscribe();
        sub.unsubscribe();
        bus.fire("ping", EventData::empty());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(bus.listeners().get("ping").is_none());
    }

    #[test]
    fn should_ignore_removal_of_unknown_listener() {
        let bus = EventBus::new();
        let (_, sub) = counter(&bus, "ping");

        assert!(!bus.remove_listener("pong", sub.id()));
        assert!(bus.remove_listener("ping", sub.id()));
        assert!(!bus.remove_listener("ping", sub.id()));
    }

    #[test]
    fn should_deliver_once_listener_a_single_time() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        let sub = bus.listen_once("ping", move |_| {
            inner.fetch_add(1, Ordering::SeqCst);
        });

        bus.fire("ping", EventData::empty());
        bus.fire("ping", EventData::empty());
        sub.unsubscribe();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(bus.listeners().is_empty());
    }

    #[test]
    fn should_deliver_once_listener_a_single_time_under_concurrent_fires() {
        let bus = Arc::new(EventBus::new());
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        bus.listen_once("ping", move |_| {
            inner.fetch_add(1, Ordering::SeqCst);
        });

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let bus = Arc::clone(&bus);
                thread::spawn(move || bus.fire("ping", EventData::empty()))
            })
            .collect();
        for handle in threads {
            handle.join().unwrap();
        }

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn should_deliver_every_event_to_match_all_listeners_first() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let exact = Arc::clone(&seen);
        bus.listen("ping", move |_| exact.lock().push("exact".to_string()));
        let all = Arc::clone(&seen);
        bus.listen(MATCH_ALL, move |event| {
            all.lock().push(format!("all:{}", event.event_type()));
        });

        bus.fire("ping", EventData::empty());
        bus.fire("pong", EventData::empty());

        assert_eq!(*seen.lock(), vec!["all:ping", "exact", "all:pong"]);
    }

    #[test]
    fn should_pass_payload_and_origin_to_listener() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(None));
        let inner = Arc::clone(&seen);
        bus.listen("ping", move |event| *inner.lock() = Some(event.clone()));

        bus.fire_event(Event::new("ping", json!({"n": 1})).with_origin(Origin::Remote));

        let event = seen.lock().clone().unwrap();
        assert_eq!(event.origin(), Origin::Remote);
        assert_eq!(event.data().get("n"), Some(&json!(1)));
    }

    #[test]
    fn should_allow_listener_to_subscribe_while_dispatching() {
        let bus = Arc::new(EventBus::new());
        let inner_bus = Arc::clone(&bus);
        bus.listen_once("ping", move |_| {
            inner_bus.listen("pong", |_| {});
            inner_bus.fire("pong", EventData::empty());
        });

        bus.fire("ping", EventData::empty());

        assert_eq!(bus.listeners().get("pong"), Some(&1));
    }

    #[test]
    fn should_count_listeners_per_type() {
        let bus = EventBus::new();
        let _a = counter(&bus, "ping");
        let _b = counter(&bus, "ping");
        let _c = counter(&bus, "pong");

        let counts = bus.listeners();
        assert_eq!(counts.get("ping"), Some(&2));
        assert_eq!(counts.get("pong"), Some(&1));
    }
}
