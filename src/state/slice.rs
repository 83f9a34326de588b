//! # Type-erased state slice.
//!
//! One feature's sub-state, wrapped in `Arc<dyn Any + Send + Sync>` for
//! zero-copy sharing across readers. Clone is an atomic increment; the
//! wrapped value is never mutated — reducers produce a fresh [`Slice`] for
//! every change, which is what makes pointer equality a reliable
//! "did anything change" signal.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// A type-erased, reference-counted, immutable state slice.
#[derive(Clone)]
pub struct Slice {
    inner: Arc<dyn Any + Send + Sync>,
}

impl Slice {
    /// Wraps a concrete sub-state value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }

    /// Borrows the slice as `T`, if that is the stored type.
    #[inline]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// True if the stored value is of type `T`.
    #[inline]
    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// `TypeId` of the stored value.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        (*self.inner).type_id()
    }

    /// True if both slices share the same allocation.
    ///
    /// An unchanged slice keeps its `Arc` across dispatches, so this is the
    /// cheap no-change test the root state relies on.
    #[inline]
    pub fn ptr_eq(a: &Slice, b: &Slice) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl fmt::Debug for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slice")
            .field("type_id", &(*self.inner).type_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct CounterState {
        value: i64,
    }

    #[test]
    fn downcast_correct_type() {
        let slice = Slice::new(CounterState { value: 5 });
        assert_eq!(
            slice.downcast_ref::<CounterState>(),
            Some(&CounterState { value: 5 })
        );
    }

    #[test]
    fn downcast_wrong_type_returns_none() {
        let slice = Slice::new(CounterState { value: 5 });
        assert!(slice.downcast_ref::<String>().is_none());
        assert!(!slice.is::<u32>());
    }

    #[test]
    fn clone_shares_the_allocation() {
        let a = Slice::new(vec![1u8, 2, 3]);
        let b = a.clone();
        assert!(Slice::ptr_eq(&a, &b));
        let pa = a.downcast_ref::<Vec<u8>>().unwrap().as_ptr();
        let pb = b.downcast_ref::<Vec<u8>>().unwrap().as_ptr();
        assert_eq!(pa, pb);
    }

    #[test]
    fn fresh_slices_are_not_ptr_equal() {
        let a = Slice::new(CounterState { value: 1 });
        let b = Slice::new(CounterState { value: 1 });
        assert!(!Slice::ptr_eq(&a, &b));
    }

    #[test]
    fn type_id_matches_the_stored_type() {
        let slice = Slice::new(42u32);
        assert_eq!(slice.type_id(), TypeId::of::<u32>());
        assert_ne!(slice.type_id(), TypeId::of::<i32>());
    }
}
