//! # Root state: the canonical keyed state tree.
//!
//! A [`RootState`] maps feature/service keys to their [`Slice`]s behind one
//! shared `Arc`. Transitions build a whole new map **only** when at least
//! one child slice actually changed; otherwise the previous `Arc` is reused
//! so [`RootState::ptr_eq`] holds across the dispatch.
//!
//! ## Rules
//! - Never mutated in place; `Clone` hands out a consistent snapshot.
//! - `ptr_eq(old, new)` ⇒ no reducer produced a new slice for that dispatch.
//! - Readers (selectors, views) need no locks.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::Slice;

/// Immutable mapping from feature key to state slice.
#[derive(Clone, Debug, Default)]
pub struct RootState {
    slices: Arc<BTreeMap<String, Slice>>,
}

impl RootState {
    /// An empty tree (the state before `InitAction`).
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_slices(slices: BTreeMap<String, Slice>) -> Self {
        Self {
            slices: Arc::new(slices),
        }
    }

    /// Borrows the raw slice stored under `key`.
    #[inline]
    pub fn slice(&self, key: &str) -> Option<&Slice> {
        self.slices.get(key)
    }

    /// Borrows the slice under `key`, downcast to `T`.
    ///
    /// `None` when the key is absent **or** holds a different type; callers
    /// that need to distinguish use [`RootState::slice`] directly.
    #[inline]
    pub fn get<T: std::any::Any>(&self, key: &str) -> Option<&T> {
        self.slices.get(key).and_then(Slice::downcast_ref)
    }

    /// True if a slice is registered under `key`.
    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.slices.contains_key(key)
    }

    /// Registered keys, in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slices.keys().map(String::as_str)
    }

    /// Number of registered slices.
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    /// True when no slice is registered yet.
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// True if both values share the same underlying map.
    ///
    /// Holds exactly when a dispatch changed nothing — the invariant the
    /// autorun layer's change detection builds on.
    #[inline]
    pub fn ptr_eq(a: &RootState, b: &RootState) -> bool {
        Arc::ptr_eq(&a.slices, &b.slices)
    }

    /// Copies the map for a transition that changed at least one slice.
    pub(crate) fn to_map(&self) -> BTreeMap<String, Slice> {
        (*self.slices).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct CounterState {
        value: i64,
    }

    fn sample() -> RootState {
        let mut map = BTreeMap::new();
        map.insert("counter".into(), Slice::new(CounterState { value: 3 }));
        map.insert("volume".into(), Slice::new(40u8));
        RootState::from_slices(map)
    }

    #[test]
    fn get_downcasts_the_slice() {
        let state = sample();
        assert_eq!(state.get::<CounterState>("counter").unwrap().value, 3);
        assert_eq!(state.get::<u8>("volume"), Some(&40));
    }

    #[test]
    fn get_with_wrong_type_or_key_is_none() {
        let state = sample();
        assert!(state.get::<String>("counter").is_none());
        assert!(state.get::<CounterState>("missing").is_none());
        assert!(!state.contains("missing"));
    }

    #[test]
    fn clones_share_the_map() {
        let a = sample();
        let b = a.clone();
        assert!(RootState::ptr_eq(&a, &b));
    }

    #[test]
    fn rebuilt_state_is_a_distinct_reference() {
        let a = sample();
        let b = RootState::from_slices(a.to_map());
        assert!(!RootState::ptr_eq(&a, &b));
        // Unchanged slices still share their allocations.
        assert!(Slice::ptr_eq(
            a.slice("counter").unwrap(),
            b.slice("counter").unwrap()
        ));
    }

    #[test]
    fn keys_are_sorted() {
        let state = sample();
        let keys: Vec<_> = state.keys().collect();
        assert_eq!(keys, vec!["counter", "volume"]);
        assert_eq!(state.len(), 2);
        assert!(!state.is_empty());
    }
}
