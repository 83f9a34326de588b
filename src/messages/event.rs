//! # Events: immutable side-effect notifications.
//!
//! [`AnyEvent`] mirrors [`AnyAction`](crate::AnyAction) but lives on the
//! outbound side: events never mutate state, they are broadcast to
//! subscribers on the worker loop after the dispatch that produced them has
//! fully settled.
//!
//! ## Rules
//! - Produced by reducers (`ReducerResult::Complete`) or by the store
//!   itself ([`FinishEvent`]).
//! - Delivery order: emission order within one dispatch, subscriber
//!   registration order within one event.
//! - A subscriber only receives the event types it registered for.

use std::fmt;
use std::sync::Arc;

use crate::messages::Message;

/// Erased, immutable, cheaply-cloneable event envelope.
#[derive(Clone)]
pub struct AnyEvent {
    inner: Arc<dyn Message>,
}

impl AnyEvent {
    /// Wraps a concrete event payload.
    pub fn new<T: Message>(payload: T) -> Self {
        Self {
            inner: Arc::new(payload),
        }
    }

    /// True if the payload is of type `T`.
    #[inline]
    pub fn is<T: Message>(&self) -> bool {
        self.inner.as_any().is::<T>()
    }

    /// Borrows the payload as `T`, if it is one.
    #[inline]
    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref::<T>()
    }

    /// `TypeId` of the payload; the subscription registry routes on this.
    #[inline]
    pub(crate) fn payload_type_id(&self) -> std::any::TypeId {
        self.inner.as_any().type_id()
    }

    /// Short payload type name, for logs.
    #[inline]
    pub fn label(&self) -> &'static str {
        self.inner.label()
    }
}

impl fmt::Debug for AnyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

/// Broadcast exactly once, after the dispatch that processed
/// `FinishAction`; subscribers use it for teardown. Once it is delivered
/// the store stops the worker (unless configured otherwise).
#[derive(Debug, Clone, Copy, Default)]
pub struct FinishEvent;

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::TypeId;

    #[derive(Debug, Clone)]
    struct VolumeChanged {
        level: u8,
    }

    #[test]
    fn downcast_and_type_id_route_on_the_payload() {
        let ev = AnyEvent::new(VolumeChanged { level: 10 });
        assert!(ev.is::<VolumeChanged>());
        assert_eq!(ev.payload_type_id(), TypeId::of::<VolumeChanged>());
        assert_eq!(ev.downcast_ref::<VolumeChanged>().unwrap().level, 10);
        assert!(!ev.is::<FinishEvent>());
    }

    #[test]
    fn label_names_the_payload_type() {
        assert_eq!(AnyEvent::new(FinishEvent).label(), "FinishEvent");
    }
}
