//! # Store: the canonical state owner.
//!
//! The [`Store`] holds the single [`RootState`] instance and mediates every
//! way in or out of it: [`dispatch`](Store::dispatch) for transitions,
//! [`subscribe_event`](Store::subscribe_event) for broadcasts,
//! [`autorun`](Store::autorun) for reactive bindings, and
//! [`snapshot`](Store::snapshot) / [`view`](Store::view) /
//! [`with_state`](Store::with_state) for pull-style reads.
//!
//! ## Architecture
//! ```text
//! any thread                     store                       worker thread
//! ──────────                    ─────────────────────────   ─────────────────
//! dispatch(action) ───────────► lock ─► root reducer ─┐
//!                               │       (children in   │ follow-up actions
//!                               │        insertion     │ re-enter depth-first
//!                               │        order)      ◄─┘
//!                               │  commit new RootState
//!                               │  autorun pass (collect)
//!                               │  flush events ─────────► delivery task
//!                               unlock                        │ per event:
//!                               run autorun reactions         │ subscribers in
//!                                                             │ registration
//!                                                             ▼ order, isolated
//! ```
//!
//! ## Rules
//! - **Serialized transitions**: one mutex guards reducer + state; reducer
//!   phases of concurrent dispatches never interleave.
//! - **Depth-first follow-ups**: actions returned by a reducer are applied,
//!   in emission order, before the dispatch call returns.
//! - **Events after settle**: no event reaches a subscriber before the
//!   whole action tree of its dispatch is committed, and delivery itself
//!   always happens on the worker loop.
//! - **One autorun pass per dispatch**: a batch settles completely, then
//!   every binding is evaluated once — a performance optimization with the
//!   same final state and final observed values as sequential dispatching.
//! - **Failure policy**: a reducer error propagates out of `dispatch`
//!   (never retried, never swallowed); state committed by earlier actions
//!   of the same call stays committed and their events are still flushed.

mod autorun;
#[cfg(feature = "logging")]
mod log;
mod subscriptions;

pub use autorun::{AutorunHandle, AutorunOptions};
#[cfg(feature = "logging")]
pub use log::LogSubscriber;
pub use subscriptions::{EventSubscriber, SubscriptionHandle};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::mpsc;

use crate::error::StoreError;
use crate::messages::{
    AnyAction, AnyEvent, DeregisterReducerAction, FinishAction, FinishEvent, InitAction, Message,
    RegisterReducerAction,
};
use crate::reducer::{CombineReducerId, CombinedReducer, SliceReducer};
use crate::state::RootState;
use crate::worker::WorkerHandle;

use autorun::AutorunRegistry;
use subscriptions::SubscriberRegistry;

/// Store construction options.
#[derive(Clone, Debug)]
pub struct StoreOptions {
    /// Dispatch [`InitAction`] during construction. Disable only for tests
    /// that exercise pre-init behavior.
    pub auto_init: bool,
    /// Stop the worker once `FinishEvent` has been delivered.
    pub stop_worker_on_finish: bool,
}

impl Default for StoreOptions {
    /// Defaults: `auto_init = true`, `stop_worker_on_finish = true`.
    fn default() -> Self {
        Self {
            auto_init: true,
            stop_worker_on_finish: true,
        }
    }
}

struct StoreCore {
    state: RootState,
    reducer: CombinedReducer,
    autoruns: AutorunRegistry,
    finished: bool,
}

struct StoreInner {
    core: Mutex<StoreCore>,
    subscribers: Arc<SubscriberRegistry>,
    events_tx: mpsc::UnboundedSender<AnyEvent>,
    worker: WorkerHandle,
    finished: AtomicBool,
    root_id: CombineReducerId,
}

/// The state container. Cheap to clone; all clones share one canonical
/// state.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Builds the store around a composed root reducer and wires its event
    /// delivery task onto the worker loop.
    ///
    /// With `auto_init` (the default) this dispatches [`InitAction`]; a
    /// child that refuses to initialize surfaces here as
    /// [`StoreError::Initialization`] — the caller decides whether that
    /// aborts bring-up or just skips the feature.
    pub fn new(
        reducer: CombinedReducer,
        worker: WorkerHandle,
        options: StoreOptions,
    ) -> Result<Store, StoreError> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let subscribers = Arc::new(SubscriberRegistry::new());
        let root_id = reducer.id();

        let inner = Arc::new(StoreInner {
            core: Mutex::new(StoreCore {
                state: RootState::new(),
                reducer,
                autoruns: AutorunRegistry::new(),
                finished: false,
            }),
            subscribers: Arc::clone(&subscribers),
            events_tx,
            worker: worker.clone(),
            finished: AtomicBool::new(false),
            root_id,
        });

        let stop_on_finish = options.stop_worker_on_finish.then(|| worker.clone());
        worker.create_task(delivery_loop(events_rx, subscribers, stop_on_finish))?;

        let store = Store { inner };
        if options.auto_init {
            store.dispatch(InitAction)?;
        }
        Ok(store)
    }

    /// Dispatches one action.
    ///
    /// Applies the root reducer, commits the new state, re-dispatches every
    /// follow-up action depth-first, schedules the emitted events for
    /// worker-loop delivery, and runs the autorun pass — all before
    /// returning.
    pub fn dispatch<A: Message>(&self, action: A) -> Result<(), StoreError> {
        self.dispatch_any(AnyAction::new(action))
    }

    /// Dispatches a pre-erased action.
    pub fn dispatch_any(&self, action: AnyAction) -> Result<(), StoreError> {
        self.run_dispatch(VecDeque::from([action]))
    }

    /// Dispatches a batch of actions atomically back-to-back.
    ///
    /// Semantically equivalent to dispatching each in turn, but dependent
    /// autoruns recompute once for the whole batch.
    pub fn dispatch_batch(
        &self,
        actions: impl IntoIterator<Item = AnyAction>,
    ) -> Result<(), StoreError> {
        self.run_dispatch(actions.into_iter().collect())
    }

    fn run_dispatch(&self, mut queue: VecDeque<AnyAction>) -> Result<(), StoreError> {
        let mut events: Vec<AnyEvent> = Vec::new();
        let mut finish = false;

        let mut guard = self.lock_core();
        if guard.finished {
            return Err(StoreError::Finished);
        }
        let core = &mut *guard;

        let mut result = Ok(());
        while let Some(action) = queue.pop_front() {
            if action.is::<FinishAction>() {
                finish = true;
            }
            match core.reducer.reduce(&core.state, &action) {
                Ok(outcome) => {
                    core.state = outcome.state;
                    for follow_up in outcome.actions.into_iter().rev() {
                        queue.push_front(follow_up);
                    }
                    events.extend(outcome.events);
                }
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }

        let reactions = if result.is_ok() {
            core.autoruns.evaluate_all(&core.state)
        } else {
            Vec::new()
        };

        if finish && result.is_ok() {
            core.finished = true;
            self.inner.finished.store(true, Ordering::SeqCst);
            events.push(AnyEvent::new(FinishEvent));
        }

        // Flushed under the lock so delivery order matches commit order
        // across threads; the channel send never blocks.
        for event in events {
            let _ = self.inner.events_tx.send(event);
        }
        drop(guard);

        for reaction in reactions {
            reaction();
        }
        result
    }

    /// Registers an event listener for events of payload type `E`.
    ///
    /// Safe to call from any thread; delivery happens on the worker loop.
    pub fn subscribe_event<E, F>(&self, handler: F) -> SubscriptionHandle
    where
        E: Message,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.inner.subscribers.register_sync::<E, F>(handler);
        self.subscription_handle(id)
    }

    /// Registers an async subscriber for events of payload type `E`.
    pub fn subscribe_async<E: Message>(
        &self,
        subscriber: Arc<dyn EventSubscriber>,
    ) -> SubscriptionHandle {
        let id = self.inner.subscribers.register_async::<E>(subscriber);
        self.subscription_handle(id)
    }

    fn subscription_handle(&self, id: u64) -> SubscriptionHandle {
        let registry = Arc::downgrade(&self.inner.subscribers);
        SubscriptionHandle::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.remove(id);
            }
        })
    }

    /// Registers a reactive binding: the reaction runs once now with the
    /// current selector value, then again after every dispatch that changes
    /// it (structural equality).
    pub fn autorun<T, S, R>(&self, selector: S, reaction: R) -> AutorunHandle
    where
        T: Clone + PartialEq + Send + 'static,
        S: Fn(&RootState) -> Option<T> + Send + 'static,
        R: Fn(T) + Send + Sync + 'static,
    {
        self.autorun_with(selector, AutorunOptions::default(), reaction)
    }

    /// [`autorun`](Self::autorun) with explicit [`AutorunOptions`].
    pub fn autorun_with<T, S, R>(
        &self,
        selector: S,
        options: AutorunOptions<T>,
        reaction: R,
    ) -> AutorunHandle
    where
        T: Clone + PartialEq + Send + 'static,
        S: Fn(&RootState) -> Option<T> + Send + 'static,
        R: Fn(T) + Send + Sync + 'static,
    {
        let mut eval = autorun::evaluator(selector, options, reaction);
        let (first, id) = {
            let mut core = self.lock_core();
            let first = eval(&core.state);
            (first, core.autoruns.insert(eval))
        };
        if let Some(run) = first {
            run();
        }

        let weak: Weak<StoreInner> = Arc::downgrade(&self.inner);
        AutorunHandle::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner
                    .core
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .autoruns
                    .remove(id);
            }
        })
    }

    /// A consistent snapshot reference of the current state.
    pub fn state(&self) -> RootState {
        self.lock_core().state.clone()
    }

    /// Computes a selector against the current state, pull-style.
    pub fn view<T>(&self, selector: impl FnOnce(&RootState) -> T) -> T {
        let state = self.state();
        selector(&state)
    }

    /// Wraps a handler so each call receives the selector's value computed
    /// at call time (pull, not reactive).
    pub fn with_state<T, R, S, H>(&self, selector: S, handler: H) -> impl Fn() -> R
    where
        S: Fn(&RootState) -> T + Send + Sync + 'static,
        H: Fn(T) -> R + Send + Sync + 'static,
    {
        let store = self.clone();
        move || {
            let state = store.state();
            handler(selector(&state))
        }
    }

    /// Serializable deep copy of the whole state tree, keyed by slice name.
    pub fn snapshot(&self) -> serde_json::Value {
        let core = self.lock_core();
        core.reducer.snapshot(&core.state)
    }

    /// Identity of the composed root reducer; dynamic registration actions
    /// must carry it.
    pub fn root_reducer_id(&self) -> CombineReducerId {
        self.inner.root_id
    }

    /// Attaches a new reducer under `key` by dispatching
    /// [`RegisterReducerAction`].
    pub fn register_reducer(
        &self,
        key: impl Into<String>,
        reducer: SliceReducer,
    ) -> Result<(), StoreError> {
        self.dispatch(RegisterReducerAction {
            combine_id: self.inner.root_id,
            key: key.into(),
            reducer,
        })
    }

    /// Detaches the reducer under `key` by dispatching
    /// [`DeregisterReducerAction`].
    pub fn deregister_reducer(&self, key: impl Into<String>) -> Result<(), StoreError> {
        self.dispatch(DeregisterReducerAction {
            combine_id: self.inner.root_id,
            key: key.into(),
        })
    }

    /// Handle to the effect worker this store delivers on.
    pub fn worker(&self) -> WorkerHandle {
        self.inner.worker.clone()
    }

    /// True once `FinishAction` has been processed.
    pub fn is_finished(&self) -> bool {
        self.inner.finished.load(Ordering::SeqCst)
    }

    fn lock_core(&self) -> std::sync::MutexGuard<'_, StoreCore> {
        self.inner
            .core
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs on the worker loop: delivers events in commit order until the
/// finish event (or until every store clone is gone).
async fn delivery_loop(
    mut events_rx: mpsc::UnboundedReceiver<AnyEvent>,
    subscribers: Arc<SubscriberRegistry>,
    stop_on_finish: Option<WorkerHandle>,
) {
    let mut finished = false;
    while let Some(event) = events_rx.recv().await {
        let is_finish = event.is::<FinishEvent>();
        subscribers.deliver(&event).await;
        if is_finish {
            finished = true;
            break;
        }
    }
    if finished {
        if let Some(worker) = stop_on_finish {
            tracing::debug!("finish event delivered; stopping worker");
            worker.stop();
        }
    }
}
