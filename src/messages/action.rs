//! # Actions: immutable state-transition requests.
//!
//! [`AnyAction`] is the erased envelope every dispatch path carries. The
//! built-in variants cover store lifecycle ([`InitAction`], [`FinishAction`])
//! and dynamic reducer composition ([`RegisterReducerAction`],
//! [`DeregisterReducerAction`]).
//!
//! ## Rules
//! - Actions are the **only** legitimate trigger for a state transition.
//! - Envelopes clone cheaply (`Arc` inside); payloads are never mutated.
//! - A reducer that does not recognize an action's type returns identity —
//!   this open-world pass-through is what lets independent reducers ignore
//!   actions meant for others.
//!
//! ## Example
//! ```rust
//! use statevisor::{AnyAction, InitAction};
//!
//! #[derive(Debug, Clone)]
//! struct Increment { amount: i64 }
//!
//! let action = AnyAction::new(Increment { amount: 5 });
//! assert!(action.is::<Increment>());
//! assert_eq!(action.downcast_ref::<Increment>().unwrap().amount, 5);
//! assert!(!action.is::<InitAction>());
//! ```

use std::fmt;
use std::sync::Arc;

use crate::messages::Message;
use crate::reducer::{CombineReducerId, SliceReducer};

/// Erased, immutable, cheaply-cloneable action envelope.
#[derive(Clone)]
pub struct AnyAction {
    inner: Arc<dyn Message>,
}

impl AnyAction {
    /// Wraps a concrete action payload.
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

    /// Short payload type name, for logs.
    #[inline]
    pub fn label(&self) -> &'static str {
        self.inner.label()
    }
}

impl fmt::Debug for AnyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

/// Initializes every slice. Dispatched once when the store is created and
/// again for each dynamically registered reducer (scoped to that child).
#[derive(Debug, Clone, Copy, Default)]
pub struct InitAction;

/// Requests an orderly store shutdown: reducers see it like any other
/// action, then the store emits `FinishEvent` and refuses further work.
#[derive(Debug, Clone, Copy, Default)]
pub struct FinishAction;

/// Atomically attaches a new reducer (and its slice) to a running store.
///
/// Recognized only by the combined root reducer whose id matches
/// `combine_id`; the new reducer is immediately invoked with `None` state
/// and [`InitAction`] and its result inserted under `key`. Fails with
/// `StoreError::DuplicateKey` if the key already exists.
#[derive(Clone)]
pub struct RegisterReducerAction {
    /// Target combinator, from `Store::root_reducer_id`.
    pub combine_id: CombineReducerId,
    /// Root-state key the new reducer will own.
    pub key: String,
    /// The reducer to attach.
    pub reducer: SliceReducer,
}

impl fmt::Debug for RegisterReducerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterReducerAction")
            .field("combine_id", &self.combine_id)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Detaches a reducer and drops its slice from the root state.
///
/// Fails with `StoreError::MissingKey` if the key is not registered.
#[derive(Debug, Clone)]
pub struct DeregisterReducerAction {
    /// Target combinator, from `Store::root_reducer_id`.
    pub combine_id: CombineReducerId,
    /// Key to remove.
    pub key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct SetVolume {
        level: u8,
    }

    #[test]
    fn downcast_matches_only_the_concrete_type() {
        let action = AnyAction::new(SetVolume { level: 30 });
        assert!(action.is::<SetVolume>());
        assert!(!action.is::<InitAction>());
        assert_eq!(
            action.downcast_ref::<SetVolume>(),
            Some(&SetVolume { level: 30 })
        );
        assert!(action.downcast_ref::<FinishAction>().is_none());
    }

    #[test]
    fn clones_share_the_payload() {
        let a = AnyAction::new(SetVolume { level: 1 });
        let b = a.clone();
        let pa = a.downcast_ref::<SetVolume>().unwrap() as *const SetVolume;
        let pb = b.downcast_ref::<SetVolume>().unwrap() as *const SetVolume;
        assert_eq!(pa, pb);
    }

    #[test]
    fn label_names_the_payload_type() {
        assert_eq!(AnyAction::new(InitAction).label(), "InitAction");
        assert_eq!(AnyAction::new(SetVolume { level: 0 }).label(), "SetVolume");
    }

    #[test]
    fn debug_renders_the_payload() {
        let action = AnyAction::new(SetVolume { level: 7 });
        let debug = format!("{action:?}");
        assert!(debug.contains("SetVolume"));
        assert!(debug.contains('7'));
    }
}
