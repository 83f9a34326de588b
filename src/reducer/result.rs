//! # Reducer return values.
//!
//! A typed reducer returns one of three shapes per action:
//!
//! - [`ReducerResult::Unchanged`] — identity; the slice keeps its `Arc`, so
//!   downstream change detection sees "nothing happened". This is the
//!   required answer for every action type the reducer does not recognize.
//! - [`ReducerResult::State`] — a plain transition.
//! - [`ReducerResult::Complete`] — a transition bundled with follow-up
//!   actions (re-enter the store, depth-first, before `dispatch` returns)
//!   and events (broadcast after the dispatch settles), as one atomic unit.

use crate::messages::{AnyAction, AnyEvent};

/// Result of one reducer invocation over typed sub-state `S`.
#[derive(Debug)]
pub enum ReducerResult<S> {
    /// The action is not for this reducer, or changed nothing.
    Unchanged,
    /// New sub-state, no side effects.
    State(S),
    /// New sub-state plus requested side effects.
    Complete {
        /// The new sub-state.
        state: S,
        /// Follow-up actions, applied depth-first in this order.
        actions: Vec<AnyAction>,
        /// Events, delivered to subscribers in this order.
        events: Vec<AnyEvent>,
    },
}

impl<S> ReducerResult<S> {
    /// A transition with side effects, built incrementally.
    ///
    /// ## Example
    /// ```rust
    /// use statevisor::ReducerResult;
    ///
    /// #[derive(Debug, Clone)]
    /// struct Beeped;
    ///
    /// let result: ReducerResult<u8> = ReducerResult::complete(1).with_event(Beeped);
    /// ```
    pub fn complete(state: S) -> Self {
        ReducerResult::Complete {
            state,
            actions: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Appends a follow-up action (upgrades `State` to `Complete`).
    pub fn with_action<A: crate::messages::Message>(self, action: A) -> Self {
        let mut result = self.into_complete();
        if let ReducerResult::Complete { actions, .. } = &mut result {
            actions.push(AnyAction::new(action));
        }
        result
    }

    /// Appends an event (upgrades `State` to `Complete`).
    pub fn with_event<E: crate::messages::Message>(self, event: E) -> Self {
        let mut result = self.into_complete();
        if let ReducerResult::Complete { events, .. } = &mut result {
            events.push(AnyEvent::new(event));
        }
        result
    }

    fn into_complete(self) -> Self {
        match self {
            ReducerResult::State(state) => ReducerResult::complete(state),
            other => other,
        }
    }
}
