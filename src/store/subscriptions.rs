//! # Event subscriptions and delivery.
//!
//! The [`SubscriberRegistry`] keeps the ordered list of event listeners;
//! the store's delivery task (running on the worker loop) calls
//! [`SubscriberRegistry::deliver`] for each event after the dispatch that
//! produced it has fully settled.
//!
//! ## Rules
//! - **Typed routing**: a listener only sees the event type it registered
//!   for (`TypeId` match on the payload).
//! - **Registration order**: listeners for one event run sequentially, in
//!   the order they subscribed.
//! - **Isolation**: a panicking listener is caught and logged; delivery
//!   continues with the next listener, and the worker loop never dies.
//! - **RAII lifecycle**: dropping a [`SubscriptionHandle`] unregisters the
//!   listener — transient owners (UI widgets) cannot leak subscriptions.
//!   `detach()` pins the listener for the process lifetime instead.

use std::any::TypeId;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::FutureExt;

use crate::error::panic_message;
use crate::messages::{AnyEvent, Message};

/// Contract for async event listeners.
///
/// Runs on the worker loop; implementations may suspend at `await` points
/// without blocking the OS thread, but must hand CPU-bound or blocking work
/// to [`WorkerHandle::run_in_background`](crate::WorkerHandle::run_in_background).
#[async_trait]
pub trait EventSubscriber: Send + Sync + 'static {
    /// Handles a single event.
    async fn on_event(&self, event: &AnyEvent);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

#[derive(Clone)]
enum Handler {
    Sync(Arc<dyn Fn(&AnyEvent) + Send + Sync>),
    Async(Arc<dyn EventSubscriber>),
}

struct SubscriberEntry {
    id: u64,
    event_type: TypeId,
    name: &'static str,
    handler: Handler,
}

/// Ordered, thread-safe listener registry.
pub(crate) struct SubscriberRegistry {
    entries: Mutex<Vec<SubscriberEntry>>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a sync closure for events of type `E`.
    pub(crate) fn register_sync<E, F>(&self, handler: F) -> u64
    where
        E: Message,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let erased = Arc::new(move |event: &AnyEvent| {
            if let Some(payload) = event.downcast_ref::<E>() {
                handler(payload);
            }
        });
        self.push::<E>(Handler::Sync(erased))
    }

    /// Registers an async subscriber for events of type `E`.
    pub(crate) fn register_async<E: Message>(&self, subscriber: Arc<dyn EventSubscriber>) -> u64 {
        self.push::<E>(Handler::Async(subscriber))
    }

    fn push<E: Message>(&self, handler: Handler) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = SubscriberEntry {
            id,
            event_type: TypeId::of::<E>(),
            name: std::any::type_name::<E>(),
            handler,
        };
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(entry);
        id
    }

    pub(crate) fn remove(&self, id: u64) {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .retain(|entry| entry.id != id);
    }

    /// Delivers one event to every matching listener, in registration
    /// order, isolating per-listener panics.
    pub(crate) async fn deliver(&self, event: &AnyEvent) {
        let matching: Vec<(&'static str, Handler)> = {
            let entries = self
                .entries
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            entries
                .iter()
                .filter(|entry| entry.event_type == event.payload_type_id())
                .map(|entry| (entry.name, entry.handler.clone()))
                .collect()
        };

        for (name, handler) in matching {
            let caught = match handler {
                Handler::Sync(f) => {
                    std::panic::catch_unwind(AssertUnwindSafe(|| f(event))).err()
                }
                Handler::Async(subscriber) => AssertUnwindSafe(subscriber.on_event(event))
                    .catch_unwind()
                    .await
                    .err(),
            };
            if let Some(payload) = caught {
                tracing::error!(
                    subscriber = name,
                    event = event.label(),
                    payload = %panic_message(payload.as_ref()),
                    "event subscriber panicked"
                );
            }
        }
    }
}

/// RAII registration of one event listener.
///
/// Dropping the handle unregisters the listener (the leak-prevention
/// guarantee for transient owners); [`detach`](Self::detach) keeps it
/// registered for the process lifetime.
#[must_use = "dropping the handle unsubscribes immediately; call detach() to keep it"]
pub struct SubscriptionHandle {
    remove: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionHandle {
    pub(crate) fn new(remove: impl FnOnce() + Send + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    /// Unregisters the listener now.
    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }

    /// Keeps the listener registered forever.
    pub fn detach(mut self) {
        self.remove.take();
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Debug, Clone)]
    struct Beep;

    #[derive(Debug, Clone)]
    struct Boop;

    fn recording(
        registry: &SubscriberRegistry,
        log: &Arc<StdMutex<Vec<&'static str>>>,
        tag: &'static str,
    ) -> u64 {
        let log = Arc::clone(log);
        registry.register_sync::<Beep, _>(move |_| {
            log.lock().unwrap().push(tag);
        })
    }

    #[tokio::test]
    async fn delivery_is_typed_and_ordered() {
        let registry = SubscriberRegistry::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        recording(&registry, &log, "first");
        recording(&registry, &log, "second");
        {
            let log = Arc::clone(&log);
            registry.register_sync::<Boop, _>(move |_| {
                log.lock().unwrap().push("other-type");
            });
        }

        registry.deliver(&AnyEvent::new(Beep)).await;
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn panicking_listener_does_not_stop_delivery() {
        let registry = SubscriberRegistry::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        recording(&registry, &log, "before");
        registry.register_sync::<Beep, _>(|_| panic!("bad subscriber"));
        recording(&registry, &log, "after");

        registry.deliver(&AnyEvent::new(Beep)).await;
        assert_eq!(*log.lock().unwrap(), vec!["before", "after"]);
    }

    #[tokio::test]
    async fn async_subscribers_run_inline() {
        struct Recorder(Arc<StdMutex<Vec<&'static str>>>);

        #[async_trait]
        impl EventSubscriber for Recorder {
            async fn on_event(&self, _event: &AnyEvent) {
                tokio::task::yield_now().await;
                self.0.lock().unwrap().push("async");
            }
        }

        let registry = SubscriberRegistry::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        registry.register_async::<Beep>(Arc::new(Recorder(Arc::clone(&log))));
        recording(&registry, &log, "sync");

        registry.deliver(&AnyEvent::new(Beep)).await;
        assert_eq!(*log.lock().unwrap(), vec!["async", "sync"]);
    }

    #[tokio::test]
    async fn removed_listeners_are_skipped_silently() {
        let registry = SubscriberRegistry::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        let id = recording(&registry, &log, "gone");
        recording(&registry, &log, "kept");
        registry.remove(id);

        registry.deliver(&AnyEvent::new(Beep)).await;
        assert_eq!(*log.lock().unwrap(), vec!["kept"]);
    }
}
