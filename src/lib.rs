//! # statevisor
//!
//! **Statevisor** is a Redux-style state container for embedded-flavored
//! Rust applications: a single canonical state tree, composable pure
//! reducers, typed event subscriptions, autorun selectors, and a dedicated
//! effect worker that serializes every asynchronous side effect onto one
//! cooperative event loop.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ GUI thread   │   │ HW callback  │   │ service task │
//!     │ dispatch()   │   │ dispatch()   │   │ dispatch()   │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Store (canonical state owner)                                    │
//! │  - CombinedReducer (one child per feature key, insertion order)   │
//! │  - RootState (immutable, Arc-shared, replaced wholesale)          │
//! │  - AutorunRegistry (selector memoization, equality-gated)         │
//! │  - SubscriberRegistry (typed listeners, registration order)       │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                │ events (after the action tree settles)
//!                                ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Worker (dedicated thread, current-thread tokio loop)             │
//! │  - delivery task: subscribers in order, panics isolated           │
//! │  - create_task / run_in_background: all side effects live here    │
//! │  - stop(): drain with bounded grace, then abort stragglers        │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Dispatch lifecycle
//! ```text
//! dispatch(action)
//!   ├─► lock: reducer phase (all children, insertion order)
//!   ├─► commit new RootState (same Arc if nothing changed)
//!   ├─► follow-up actions re-enter depth-first, in emission order
//!   ├─► autorun pass: one evaluation per binding per dispatch
//!   ├─► events flushed to the worker loop, in commit order
//!   └─► return (reducer errors propagate to the caller, never retried)
//! ```
//!
//! ## Features
//! | Area              | Description                                                       | Key types / traits                        |
//! |-------------------|-------------------------------------------------------------------|-------------------------------------------|
//! | **State**         | Immutable keyed tree with type-erased, Arc-shared slices.         | [`RootState`], [`Slice`]                  |
//! | **Messages**      | Erased immutable actions and events with typed downcast.          | [`AnyAction`], [`AnyEvent`], [`Message`]  |
//! | **Reducers**      | Pure per-slice reducers, composed with runtime register/deregister.| [`SliceReducer`], [`combine_reducers`]    |
//! | **Store**         | Dispatch, subscriptions, autorun, snapshot.                       | [`Store`], [`AutorunOptions`]             |
//! | **Worker**        | Single-threaded effect loop with graceful shutdown.               | [`Worker`], [`WorkerHandle`]              |
//! | **Bridging**      | Correlation-id request/response over actions and events.          | [`RequestBridge`]                         |
//! | **Services**      | Static plugin manifest with log-and-skip bring-up.                | [`ServiceDescriptor`], [`load_services`]  |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogSubscriber`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use serde::Serialize;
//! use statevisor::{
//!     combine_reducers, AnyAction, FinishAction, ReducerResult, SliceReducer, Store,
//!     StoreOptions, Worker, WorkerConfig,
//! };
//!
//! #[derive(Debug, Clone, Serialize, PartialEq)]
//! struct CounterState { value: i64 }
//!
//! #[derive(Debug, Clone)]
//! struct Increment { amount: i64 }
//!
//! fn counter(state: Option<&CounterState>, action: &AnyAction)
//!     -> Result<ReducerResult<CounterState>, statevisor::ReducerError>
//! {
//!     let Some(state) = state else {
//!         return Ok(ReducerResult::State(CounterState { value: 0 }));
//!     };
//!     if let Some(inc) = action.downcast_ref::<Increment>() {
//!         return Ok(ReducerResult::State(CounterState { value: state.value + inc.amount }));
//!     }
//!     Ok(ReducerResult::Unchanged)
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let worker = Worker::start(WorkerConfig::default())?;
//!     let reducer = combine_reducers(vec![("counter", SliceReducer::typed(counter))])?;
//!     let store = Store::new(reducer, worker.handle(), StoreOptions::default())?;
//!
//!     store.autorun(
//!         |state| state.get::<CounterState>("counter").map(|c| c.value),
//!         |value| println!("counter is now {value}"),
//!     ).detach();
//!
//!     store.dispatch(Increment { amount: 5 })?;
//!     store.dispatch(Increment { amount: -2 })?;
//!     assert_eq!(store.view(|s| s.get::<CounterState>("counter").unwrap().value), 3);
//!
//!     store.dispatch(FinishAction)?;
//!     worker.join();
//!     Ok(())
//! }
//! ```

mod bridge;
mod error;
mod messages;
mod reducer;
mod services;
mod state;
mod store;
mod worker;

// ---- Public re-exports ----

pub use bridge::{PendingRequest, RequestBridge, RequestCanceled, RequestId};
pub use error::{install_panic_hook, ReducerError, StoreError, WorkerError};
pub use messages::{
    AnyAction, AnyEvent, DeregisterReducerAction, FinishAction, FinishEvent, InitAction, Message,
    RegisterReducerAction,
};
pub use reducer::{combine_reducers, CombineReducerId, CombinedReducer, ReducerResult, SliceReducer};
pub use services::{load_services, ServiceContext, ServiceDescriptor, ServiceError};
pub use state::{RootState, Slice};
pub use store::{
    AutorunHandle, AutorunOptions, EventSubscriber, Store, StoreOptions, SubscriptionHandle,
};
pub use worker::{
    bind_shutdown_signals, wait_for_shutdown_signal, BackgroundJob, TaskHandle, Worker,
    WorkerConfig, WorkerHandle,
};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use store::LogSubscriber;
