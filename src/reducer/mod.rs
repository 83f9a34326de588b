//! Reducer model and composition.
//!
//! - [`ReducerResult`] — what a typed reducer returns for one action.
//! - [`SliceReducer`] — erased reducer + snapshot serializer for one slice.
//! - [`combine_reducers`] / [`CombinedReducer`] — composes named slice
//!   reducers into the root reducer, with runtime register/deregister.
//!
//! Reducers are pure: no I/O, no blocking, no dispatching — side effects
//! are requested by returning follow-up actions and events from
//! [`ReducerResult::Complete`].

mod combine;
mod result;
mod slice_reducer;

pub use combine::{combine_reducers, CombineReducerId, CombinedReducer};
pub use result::ReducerResult;
pub use slice_reducer::{SliceOutcome, SliceReducer};
