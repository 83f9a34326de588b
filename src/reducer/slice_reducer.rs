//! # Erased per-slice reducer.
//!
//! [`SliceReducer`] packages a typed reducer function behind a uniform
//! erased signature, together with the serializer that renders its slice
//! for [`Store::snapshot`](crate::Store::snapshot).
//!
//! ## Contract enforced by the adapter
//! - `None` state + `InitAction` → the reducer **must** produce a state.
//! - `None` state + anything else → [`ReducerError::Initialization`]. A
//!   reducer is therefore guaranteed to see `Some(state)` for every action
//!   after its init, and services cannot observe half-initialized slices.
//! - `Some(slice)` of the wrong concrete type → `TypeMismatch`.
//! - [`ReducerResult::Unchanged`] passes the previous `Slice` through with
//!   its `Arc` intact, which is what keeps unrecognized actions free of
//!   spurious re-renders downstream.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::ReducerError;
use crate::messages::{AnyAction, AnyEvent, InitAction};
use crate::reducer::ReducerResult;
use crate::state::Slice;

type ReduceFn =
    Arc<dyn Fn(Option<&Slice>, &AnyAction) -> Result<SliceOutcome, ReducerError> + Send + Sync>;
type SerializeFn = Arc<dyn Fn(&Slice) -> Option<serde_json::Value> + Send + Sync>;

/// Erased outcome of one slice-reducer invocation.
#[derive(Debug)]
pub struct SliceOutcome {
    /// The (possibly passed-through) slice after the action.
    pub slice: Slice,
    /// False when `slice` is the previous allocation, untouched.
    pub changed: bool,
    /// Follow-up actions in emission order.
    pub actions: Vec<AnyAction>,
    /// Events in emission order.
    pub events: Vec<AnyEvent>,
}

impl SliceOutcome {
    fn unchanged(slice: Slice) -> Self {
        Self {
            slice,
            changed: false,
            actions: Vec::new(),
            events: Vec::new(),
        }
    }
}

/// A pure reducer over one slice, plus its snapshot serializer.
///
/// Cheap to clone; carried inside
/// [`RegisterReducerAction`](crate::RegisterReducerAction) for runtime
/// registration.
#[derive(Clone)]
pub struct SliceReducer {
    reduce: ReduceFn,
    serialize: SerializeFn,
}

impl SliceReducer {
    /// Wraps a typed reducer function.
    ///
    /// `S` is the slice's concrete state type; it must be `Serialize` so
    /// the store snapshot can render it.
    ///
    /// ## Example
    /// ```rust
    /// use serde::Serialize;
    /// use statevisor::{AnyAction, InitAction, ReducerError, ReducerResult, SliceReducer};
    ///
    /// #[derive(Debug, Clone, Serialize)]
    /// struct CounterState { value: i64 }
    ///
    /// #[derive(Debug, Clone)]
    /// struct Increment { amount: i64 }
    ///
    /// let reducer = SliceReducer::typed(
    ///     |state: Option<&CounterState>, action: &AnyAction| {
    ///         let Some(state) = state else {
    ///             return Ok(ReducerResult::State(CounterState { value: 0 }));
    ///         };
    ///         if let Some(inc) = action.downcast_ref::<Increment>() {
    ///             return Ok(ReducerResult::State(CounterState {
    ///                 value: state.value + inc.amount,
    ///             }));
    ///         }
    ///         Ok(ReducerResult::Unchanged)
    ///     },
    /// );
    /// # let _ = reducer;
    /// ```
    pub fn typed<S, F>(reduce: F) -> Self
    where
        S: Send + Sync + Serialize + 'static,
        F: Fn(Option<&S>, &AnyAction) -> Result<ReducerResult<S>, ReducerError>
            + Send
            + Sync
            + 'static,
    {
        let reduce: ReduceFn = Arc::new(move |slice, action| match slice {
            None => {
                if !action.is::<InitAction>() {
                    return Err(ReducerError::Initialization {
                        action: format!("{action:?}"),
                    });
                }
                match reduce(None, action)? {
                    ReducerResult::Unchanged => Err(ReducerError::Initialization {
                        action: format!("{action:?}"),
                    }),
                    result => Ok(build_outcome(result)),
                }
            }
            Some(slice) => {
                let state =
                    slice
                        .downcast_ref::<S>()
                        .ok_or_else(|| ReducerError::TypeMismatch {
                            expected: std::any::type_name::<S>(),
                        })?;
                match reduce(Some(state), action)? {
                    ReducerResult::Unchanged => Ok(SliceOutcome::unchanged(slice.clone())),
                    result => Ok(build_outcome(result)),
                }
            }
        });

        let serialize: SerializeFn = Arc::new(|slice| {
            slice
                .downcast_ref::<S>()
                .and_then(|state| serde_json::to_value(state).ok())
        });

        Self { reduce, serialize }
    }

    pub(crate) fn reduce(
        &self,
        slice: Option<&Slice>,
        action: &AnyAction,
    ) -> Result<SliceOutcome, ReducerError> {
        (self.reduce)(slice, action)
    }

    pub(crate) fn serialize(&self, slice: &Slice) -> Option<serde_json::Value> {
        (self.serialize)(slice)
    }
}

impl fmt::Debug for SliceReducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SliceReducer").finish_non_exhaustive()
    }
}

fn build_outcome<S: Send + Sync + 'static>(result: ReducerResult<S>) -> SliceOutcome {
    match result {
        ReducerResult::State(state) => SliceOutcome {
            slice: Slice::new(state),
            changed: true,
            actions: Vec::new(),
            events: Vec::new(),
        },
        ReducerResult::Complete {
            state,
            actions,
            events,
        } => SliceOutcome {
            slice: Slice::new(state),
            changed: true,
            actions,
            events,
        },
        // Both callers handle Unchanged before getting here.
        ReducerResult::Unchanged => unreachable!("Unchanged handled by the adapter"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Debug, Clone, Serialize, PartialEq)]
    struct CounterState {
        value: i64,
    }

    #[derive(Debug, Clone)]
    struct Increment {
        amount: i64,
    }

    fn counter() -> SliceReducer {
        SliceReducer::typed(|state: Option<&CounterState>, action: &AnyAction| {
            let Some(state) = state else {
                return Ok(ReducerResult::State(CounterState { value: 0 }));
            };
            if let Some(inc) = action.downcast_ref::<Increment>() {
                return Ok(ReducerResult::State(CounterState {
                    value: state.value + inc.amount,
                }));
            }
            Ok(ReducerResult::Unchanged)
        })
    }

    #[test]
    fn init_produces_the_initial_slice() {
        let outcome = counter()
            .reduce(None, &AnyAction::new(InitAction))
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(
            outcome.slice.downcast_ref::<CounterState>().unwrap().value,
            0
        );
    }

    #[test]
    fn non_init_before_init_is_refused() {
        let err = counter()
            .reduce(None, &AnyAction::new(Increment { amount: 5 }))
            .unwrap_err();
        assert!(err.is_initialization());
    }

    #[test]
    fn unrecognized_action_passes_the_slice_through() {
        #[derive(Debug, Clone)]
        struct SomeoneElses;

        let slice = Slice::new(CounterState { value: 9 });
        let outcome = counter()
            .reduce(Some(&slice), &AnyAction::new(SomeoneElses))
            .unwrap();
        assert!(!outcome.changed);
        assert!(Slice::ptr_eq(&slice, &outcome.slice));
    }

    #[test]
    fn recognized_action_builds_a_fresh_slice() {
        let slice = Slice::new(CounterState { value: 9 });
        let outcome = counter()
            .reduce(Some(&slice), &AnyAction::new(Increment { amount: -2 }))
            .unwrap();
        assert!(outcome.changed);
        assert!(!Slice::ptr_eq(&slice, &outcome.slice));
        assert_eq!(
            outcome.slice.downcast_ref::<CounterState>().unwrap().value,
            7
        );
    }

    #[test]
    fn wrong_slice_type_is_a_type_mismatch() {
        let slice = Slice::new("not a counter".to_string());
        let err = counter()
            .reduce(Some(&slice), &AnyAction::new(InitAction))
            .unwrap_err();
        assert_eq!(err.as_label(), "reducer_type_mismatch");
    }

    #[test]
    fn serializer_renders_the_slice() {
        let slice = Slice::new(CounterState { value: 3 });
        let json = counter().serialize(&slice).unwrap();
        assert_eq!(json, serde_json::json!({ "value": 3 }));
    }
}
