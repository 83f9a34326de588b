//! # Reducer composition engine.
//!
//! [`combine_reducers`] builds the root reducer from named slice reducers.
//! Each child owns one key of the root state; the combinator also services
//! the two runtime-composition actions so plugins can attach and detach
//! state after the application has started.
//!
//! ## Dispatch algorithm
//! ```text
//! reduce(state, action)
//!     │
//!     ├─ RegisterReducerAction{id==self}   → init child with (None, Init),
//!     │                                      insert slice, adopt child
//!     ├─ DeregisterReducerAction{id==self} → drop child + slice
//!     │
//!     └─ otherwise, for each child in insertion order:
//!           outcome = child.reduce(state[key], action)
//!           collect outcome.{actions, events} in iteration order
//!        new root map is built ONLY if some child's slice changed;
//!        otherwise the previous Arc is returned untouched
//! ```
//!
//! ## Rules
//! - Child order is **insertion order** and stable across dispatches.
//! - A child failing on `InitAction` → `StoreError::Initialization` (fatal
//!   for that child at bring-up; the caller decides abort vs. skip).
//! - A child failing on any other action → `StoreError::Reducer`,
//!   propagated as-is; reducers are never retried.
//! - Register/deregister actions addressed to a *different* combinator id
//!   fall through to the children like any other action.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{ReducerError, StoreError};
use crate::messages::{
    AnyAction, AnyEvent, DeregisterReducerAction, InitAction, RegisterReducerAction,
};
use crate::reducer::{SliceOutcome, SliceReducer};
use crate::state::RootState;

/// Allocator for combinator identities.
static COMBINE_ID: AtomicU64 = AtomicU64::new(0);

/// Opaque identity of one composed root reducer.
///
/// Returned by [`combine_reducers`] and exposed as
/// [`Store::root_reducer_id`](crate::Store::root_reducer_id); dynamic
/// registration actions must carry it so that nested combinators ignore
/// requests meant for another level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CombineReducerId(u64);

impl CombineReducerId {
    fn next() -> Self {
        Self(COMBINE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Aggregated result of one root-reducer pass.
#[derive(Debug)]
pub(crate) struct CombinedOutcome {
    /// The root state after the action (same `Arc` when nothing changed).
    pub state: RootState,
    /// Follow-up actions from all children, in iteration order.
    pub actions: Vec<AnyAction>,
    /// Events from all children, in iteration order.
    pub events: Vec<AnyEvent>,
}

/// The composed root reducer.
#[derive(Debug)]
pub struct CombinedReducer {
    id: CombineReducerId,
    children: Vec<(String, SliceReducer)>,
}

/// Composes named slice reducers into one root reducer.
///
/// Child iteration order is the order given here. Fails with
/// [`StoreError::DuplicateKey`] if two children share a key.
pub fn combine_reducers(
    children: Vec<(impl Into<String>, SliceReducer)>,
) -> Result<CombinedReducer, StoreError> {
    let mut combined = CombinedReducer {
        id: CombineReducerId::next(),
        children: Vec::with_capacity(children.len()),
    };
    for (key, reducer) in children {
        let key = key.into();
        if combined.child_index(&key).is_some() {
            return Err(StoreError::DuplicateKey { key });
        }
        combined.children.push((key, reducer));
    }
    Ok(combined)
}

impl CombinedReducer {
    /// This combinator's identity.
    pub fn id(&self) -> CombineReducerId {
        self.id
    }

    /// Registered child keys in iteration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(|(key, _)| key.as_str())
    }

    fn child_index(&self, key: &str) -> Option<usize> {
        self.children.iter().position(|(k, _)| k == key)
    }

    /// Runs one action through the composition (see module doc).
    pub(crate) fn reduce(
        &mut self,
        state: &RootState,
        action: &AnyAction,
    ) -> Result<CombinedOutcome, StoreError> {
        if let Some(register) = action.downcast_ref::<RegisterReducerAction>() {
            if register.combine_id == self.id {
                return self.register(state, register);
            }
        }
        if let Some(deregister) = action.downcast_ref::<DeregisterReducerAction>() {
            if deregister.combine_id == self.id {
                return self.deregister(state, &deregister.key);
            }
        }

        let mut changed: Vec<(usize, SliceOutcome)> = Vec::new();
        let mut actions = Vec::new();
        let mut events = Vec::new();

        for (index, (key, reducer)) in self.children.iter().enumerate() {
            let mut outcome = reducer
                .reduce(state.slice(key), action)
                .map_err(|source| wrap_child_error(key, source))?;
            actions.append(&mut outcome.actions);
            events.append(&mut outcome.events);
            if outcome.changed {
                changed.push((index, outcome));
            }
        }

        let state = if changed.is_empty() {
            state.clone()
        } else {
            let mut map = state.to_map();
            for (index, outcome) in changed {
                map.insert(self.children[index].0.clone(), outcome.slice);
            }
            RootState::from_slices(map)
        };

        Ok(CombinedOutcome {
            state,
            actions,
            events,
        })
    }

    fn register(
        &mut self,
        state: &RootState,
        action: &RegisterReducerAction,
    ) -> Result<CombinedOutcome, StoreError> {
        if self.child_index(&action.key).is_some() || state.contains(&action.key) {
            return Err(StoreError::DuplicateKey {
                key: action.key.clone(),
            });
        }

        let init = AnyAction::new(InitAction);
        let outcome = action
            .reducer
            .reduce(None, &init)
            .map_err(|source| StoreError::Initialization {
                key: action.key.clone(),
                source,
            })?;

        let mut map = state.to_map();
        map.insert(action.key.clone(), outcome.slice);
        self.children
            .push((action.key.clone(), action.reducer.clone()));

        Ok(CombinedOutcome {
            state: RootState::from_slices(map),
            actions: outcome.actions,
            events: outcome.events,
        })
    }

    fn deregister(&mut self, state: &RootState, key: &str) -> Result<CombinedOutcome, StoreError> {
        let index = self
            .child_index(key)
            .ok_or_else(|| StoreError::MissingKey { key: key.into() })?;
        self.children.remove(index);

        let mut map = state.to_map();
        map.remove(key);

        Ok(CombinedOutcome {
            state: RootState::from_slices(map),
            actions: Vec::new(),
            events: Vec::new(),
        })
    }

    /// Renders every slice through its captured serializer.
    pub(crate) fn snapshot(&self, state: &RootState) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (key, reducer) in &self.children {
            let value = state
                .slice(key)
                .and_then(|slice| reducer.serialize(slice))
                .unwrap_or(serde_json::Value::Null);
            map.insert(key.clone(), value);
        }
        serde_json::Value::Object(map)
    }
}

fn wrap_child_error(key: &str, source: ReducerError) -> StoreError {
    if source.is_initialization() {
        StoreError::Initialization {
            key: key.into(),
            source,
        }
    } else {
        StoreError::Reducer {
            key: key.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::ReducerResult;
    use serde::Serialize;

    #[derive(Debug, Clone, Serialize, PartialEq)]
    struct CounterState {
        value: i64,
    }

    #[derive(Debug, Clone)]
    struct Increment {
        amount: i64,
    }

    #[derive(Debug, Clone)]
    struct Incremented;

    fn counter() -> SliceReducer {
        SliceReducer::typed(|state: Option<&CounterState>, action: &AnyAction| {
            let Some(state) = state else {
                return Ok(ReducerResult::State(CounterState { value: 0 }));
            };
            if let Some(inc) = action.downcast_ref::<Increment>() {
                return Ok(ReducerResult::State(CounterState {
                    value: state.value + inc.amount,
                })
                .with_event(Incremented));
            }
            Ok(ReducerResult::Unchanged)
        })
    }

    fn tick_label() -> SliceReducer {
        // Reacts to Incremented-follow-up bookkeeping via a plain action.
        SliceReducer::typed(|state: Option<&String>, action: &AnyAction| {
            let Some(state) = state else {
                return Ok(ReducerResult::State(String::from("idle")));
            };
            if action.is::<Increment>() {
                return Ok(ReducerResult::State(format!("{state}+")));
            }
            Ok(ReducerResult::Unchanged)
        })
    }

    fn init(combined: &mut CombinedReducer) -> RootState {
        combined
            .reduce(&RootState::new(), &AnyAction::new(InitAction))
            .unwrap()
            .state
    }

    #[test]
    fn init_populates_every_child_in_order() {
        let mut combined =
            combine_reducers(vec![("counter", counter()), ("label", tick_label())]).unwrap();
        let state = init(&mut combined);
        assert_eq!(state.get::<CounterState>("counter").unwrap().value, 0);
        assert_eq!(state.get::<String>("label").unwrap(), "idle");
        let keys: Vec<_> = combined.keys().collect();
        assert_eq!(keys, vec!["counter", "label"]);
    }

    #[test]
    fn duplicate_keys_are_rejected_at_composition() {
        let err = combine_reducers(vec![("counter", counter()), ("counter", counter())])
            .unwrap_err();
        assert_eq!(err.as_label(), "store_duplicate_key");
    }

    #[test]
    fn unrecognized_action_keeps_the_state_reference() {
        #[derive(Debug, Clone)]
        struct Unrelated;

        let mut combined = combine_reducers(vec![("counter", counter())]).unwrap();
        let state = init(&mut combined);
        let outcome = combined.reduce(&state, &AnyAction::new(Unrelated)).unwrap();
        assert!(RootState::ptr_eq(&state, &outcome.state));
        assert!(outcome.actions.is_empty());
        assert!(outcome.events.is_empty());
    }

    #[test]
    fn non_init_before_init_raises_for_the_uninitialized_child() {
        let mut combined = combine_reducers(vec![("counter", counter())]).unwrap();
        let err = combined
            .reduce(&RootState::new(), &AnyAction::new(Increment { amount: 1 }))
            .unwrap_err();
        assert_eq!(err.as_label(), "store_initialization");
    }

    fn settings() -> SliceReducer {
        // Initializes once, then ignores everything.
        SliceReducer::typed(|state: Option<&u8>, _action: &AnyAction| {
            if state.is_none() {
                return Ok(ReducerResult::State(0u8));
            }
            Ok(ReducerResult::Unchanged)
        })
    }

    #[test]
    fn changed_children_produce_a_new_root_with_shared_unchanged_slices() {
        let mut combined =
            combine_reducers(vec![("counter", counter()), ("settings", settings())]).unwrap();
        let state = init(&mut combined);
        let settings_before = state.slice("settings").unwrap().clone();

        let outcome = combined
            .reduce(&state, &AnyAction::new(Increment { amount: 5 }))
            .unwrap();
        assert!(!RootState::ptr_eq(&state, &outcome.state));
        assert_eq!(
            outcome.state.get::<CounterState>("counter").unwrap().value,
            5
        );
        // The untouched branch keeps its allocation across the transition.
        assert!(crate::state::Slice::ptr_eq(
            &settings_before,
            outcome.state.slice("settings").unwrap()
        ));
    }

    #[test]
    fn events_are_collected_in_iteration_order() {
        let mut combined =
            combine_reducers(vec![("a", counter()), ("b", counter())]).unwrap();
        let state = init(&mut combined);
        let outcome = combined
            .reduce(&state, &AnyAction::new(Increment { amount: 1 }))
            .unwrap();
        assert_eq!(outcome.events.len(), 2);
        assert!(outcome.events.iter().all(|ev| ev.is::<Incremented>()));
    }

    #[test]
    fn register_initializes_the_new_child_atomically() {
        let mut combined = combine_reducers(vec![("counter", counter())]).unwrap();
        let state = init(&mut combined);

        let register = RegisterReducerAction {
            combine_id: combined.id(),
            key: "label".into(),
            reducer: tick_label(),
        };
        let outcome = combined
            .reduce(&state, &AnyAction::new(register))
            .unwrap();
        assert_eq!(outcome.state.get::<String>("label").unwrap(), "idle");

        // The new child now participates in ordinary dispatches.
        let outcome = combined
            .reduce(&outcome.state, &AnyAction::new(Increment { amount: 2 }))
            .unwrap();
        assert_eq!(outcome.state.get::<String>("label").unwrap(), "idle+");
    }

    #[test]
    fn register_twice_with_the_same_key_fails() {
        let mut combined = combine_reducers(vec![("counter", counter())]).unwrap();
        let state = init(&mut combined);

        let register = |combined: &CombinedReducer| {
            AnyAction::new(RegisterReducerAction {
                combine_id: combined.id(),
                key: "label".into(),
                reducer: tick_label(),
            })
        };
        let action = register(&combined);
        let state = combined.reduce(&state, &action).unwrap().state;
        let action = register(&combined);
        let err = combined.reduce(&state, &action).unwrap_err();
        assert_eq!(err.as_label(), "store_duplicate_key");
    }

    #[test]
    fn deregister_removes_key_and_child() {
        let mut combined =
            combine_reducers(vec![("counter", counter()), ("label", tick_label())]).unwrap();
        let state = init(&mut combined);

        let action = AnyAction::new(DeregisterReducerAction {
            combine_id: combined.id(),
            key: "label".into(),
        });
        let outcome = combined.reduce(&state, &action).unwrap();
        assert!(!outcome.state.contains("label"));

        let err = combined.reduce(&outcome.state, &action).unwrap_err();
        assert_eq!(err.as_label(), "store_missing_key");
    }

    #[test]
    fn registration_for_another_combinator_falls_through() {
        let other = combine_reducers(vec![("x", counter())]).unwrap();
        let mut combined = combine_reducers(vec![("counter", counter())]).unwrap();
        let state = init(&mut combined);

        let action = AnyAction::new(DeregisterReducerAction {
            combine_id: other.id(),
            key: "counter".into(),
        });
        // Addressed elsewhere: children see it and ignore it.
        let outcome = combined.reduce(&state, &action).unwrap();
        assert!(RootState::ptr_eq(&state, &outcome.state));
        assert!(outcome.state.contains("counter"));
    }

    #[test]
    fn snapshot_renders_all_slices() {
        let mut combined =
            combine_reducers(vec![("counter", counter()), ("label", tick_label())]).unwrap();
        let state = init(&mut combined);
        let snapshot = combined.snapshot(&state);
        assert_eq!(
            snapshot,
            serde_json::json!({ "counter": { "value": 0 }, "label": "idle" })
        );
    }
}
