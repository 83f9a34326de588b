//! # Autorun: reactive state-derived bindings.
//!
//! An autorun binding pairs a cheap, pure selector over [`RootState`] with
//! a reaction callback. The store re-evaluates every binding once per
//! dispatch and invokes the reaction only when the selector's output
//! differs from the previous run by structural equality (`PartialEq`) —
//! the selector, not the state reference, decides.
//!
//! ## Rules
//! - Evaluated on the dispatch path: selectors must be pure projections
//!   (no I/O, no allocation-heavy work).
//! - Reactions run after the state lock is released, so they may dispatch.
//! - [`AutorunOptions::default_value`] substitutes for a selector miss
//!   (slice not registered yet); [`AutorunOptions::always_run`] disables
//!   the equality gate for log-style reactions.
//! - Dropping the [`AutorunHandle`] removes the binding (RAII, same
//!   lifecycle as event subscriptions).

use std::sync::Arc;

use crate::state::RootState;

/// Options for one autorun binding.
#[derive(Clone, Debug)]
pub struct AutorunOptions<T> {
    /// Used when the selector returns `None` (e.g. the slice has not been
    /// registered yet).
    pub default_value: Option<T>,
    /// Invoke the reaction on every dispatch, skipping the equality gate.
    pub always_run: bool,
}

impl<T> Default for AutorunOptions<T> {
    fn default() -> Self {
        Self {
            default_value: None,
            always_run: false,
        }
    }
}

/// Deferred reaction, executed after the state lock is released.
pub(crate) type Reaction = Box<dyn FnOnce() + Send>;

/// One binding: evaluates the selector against a state, remembers the last
/// delivered value, returns the reaction to run when it changed.
pub(crate) type Evaluator = Box<dyn FnMut(&RootState) -> Option<Reaction> + Send>;

/// Builds the evaluator closure for one binding.
pub(crate) fn evaluator<T, S, R>(selector: S, options: AutorunOptions<T>, reaction: R) -> Evaluator
where
    T: Clone + PartialEq + Send + 'static,
    S: Fn(&RootState) -> Option<T> + Send + 'static,
    R: Fn(T) + Send + Sync + 'static,
{
    let reaction = Arc::new(reaction);
    let mut last: Option<T> = None;
    Box::new(move |state: &RootState| {
        let value = selector(state).or_else(|| options.default_value.clone())?;
        if !options.always_run && last.as_ref() == Some(&value) {
            return None;
        }
        last = Some(value.clone());
        let reaction = Arc::clone(&reaction);
        Some(Box::new(move || reaction(value)) as Reaction)
    })
}

/// Registered bindings, evaluated in registration order.
pub(crate) struct AutorunRegistry {
    bindings: Vec<(u64, Evaluator)>,
    next_id: u64,
}

impl AutorunRegistry {
    pub(crate) fn new() -> Self {
        Self {
            bindings: Vec::new(),
            next_id: 1,
        }
    }

    pub(crate) fn insert(&mut self, eval: Evaluator) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.bindings.push((id, eval));
        id
    }

    pub(crate) fn remove(&mut self, id: u64) {
        self.bindings.retain(|(binding_id, _)| *binding_id != id);
    }

    /// One pass over all bindings; returns the reactions to run.
    pub(crate) fn evaluate_all(&mut self, state: &RootState) -> Vec<Reaction> {
        self.bindings
            .iter_mut()
            .filter_map(|(_, eval)| eval(state))
            .collect()
    }
}

/// RAII registration of one autorun binding.
///
/// Dropping the handle removes the binding; [`detach`](Self::detach) keeps
/// it for the process lifetime.
#[must_use = "dropping the handle removes the binding; call detach() to keep it"]
pub struct AutorunHandle {
    remove: Option<Box<dyn FnOnce() + Send>>,
}

impl AutorunHandle {
    pub(crate) fn new(remove: impl FnOnce() + Send + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    /// Removes the binding now.
    pub fn dispose(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }

    /// Keeps the binding registered forever.
    pub fn detach(mut self) {
        self.remove.take();
    }
}

impl Drop for AutorunHandle {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Slice;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    fn state_with(value: i64) -> RootState {
        let mut map = BTreeMap::new();
        map.insert("counter".to_string(), Slice::new(value));
        RootState::from_slices(map)
    }

    fn counter_selector() -> impl Fn(&RootState) -> Option<i64> + Send + 'static {
        |state: &RootState| state.get::<i64>("counter").copied()
    }

    #[test]
    fn reaction_fires_only_on_changed_values() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_c = Arc::clone(&seen);
        let mut eval = evaluator(counter_selector(), AutorunOptions::default(), move |v| {
            seen_c.lock().unwrap().push(v)
        });

        for value in [1, 1, 2, 2, 1] {
            if let Some(run) = eval(&state_with(value)) {
                run();
            }
        }
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 1]);
    }

    #[test]
    fn always_run_skips_the_equality_gate() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_c = Arc::clone(&seen);
        let options = AutorunOptions {
            default_value: None,
            always_run: true,
        };
        let mut eval = evaluator(counter_selector(), options, move |v| {
            seen_c.lock().unwrap().push(v)
        });

        for value in [1, 1, 1] {
            if let Some(run) = eval(&state_with(value)) {
                run();
            }
        }
        assert_eq!(*seen.lock().unwrap(), vec![1, 1, 1]);
    }

    #[test]
    fn default_value_substitutes_for_missing_slices() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_c = Arc::clone(&seen);
        let options = AutorunOptions {
            default_value: Some(0),
            always_run: false,
        };
        let mut eval = evaluator(counter_selector(), options, move |v| {
            seen_c.lock().unwrap().push(v)
        });

        if let Some(run) = eval(&RootState::new()) {
            run();
        }
        if let Some(run) = eval(&state_with(5)) {
            run();
        }
        assert_eq!(*seen.lock().unwrap(), vec![0, 5]);
    }

    #[test]
    fn missing_slice_without_default_is_skipped() {
        let mut eval = evaluator(counter_selector(), AutorunOptions::default(), |_| {
            panic!("must not run")
        });
        assert!(eval(&RootState::new()).is_none());
    }

    #[test]
    fn registry_removal_stops_evaluation() {
        let seen = Arc::new(Mutex::new(0u32));
        let seen_c = Arc::clone(&seen);
        let mut registry = AutorunRegistry::new();
        let options = AutorunOptions {
            default_value: None,
            always_run: true,
        };
        let id = registry.insert(evaluator(counter_selector(), options, move |_| {
            *seen_c.lock().unwrap() += 1
        }));

        for run in registry.evaluate_all(&state_with(1)) {
            run();
        }
        registry.remove(id);
        for run in registry.evaluate_all(&state_with(2)) {
            run();
        }
        assert_eq!(*seen.lock().unwrap(), 1);
    }
}
