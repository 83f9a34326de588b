//! # Request/response bridging over the action/event interfaces.
//!
//! Imperative flows ("ask the user for input, wait for the answer") are
//! built from one dispatch and one subscription: dispatch a *demand*
//! action carrying a correlation id, then await a future that an event
//! handler resolves with *provide* or *cancel*. [`RequestBridge`] owns the
//! pending futures, keyed by generated [`RequestId`]s, and supports many
//! concurrent requests.
//!
//! ## Architecture
//! ```text
//! requester                         bridge                    event handler
//! ─────────                        ───────────────────────   ─────────────
//! (id, pending) = demand()   ──►   pending map: id → oneshot
//! dispatch(Demand { id, .. })
//! pending.await  ◄────────────────────────────────────────── provide(id, v)
//!                                                            or cancel(id)
//! ```
//!
//! ## Rules
//! - `provide`/`cancel` return `false` for unknown (already resolved,
//!   cancelled, or dropped) ids — resolution is exactly-once.
//! - Dropping a [`PendingRequest`] withdraws the request; a later
//!   `provide` for its id is a no-op.
//! - `cancel_all` sweeps every pending request at shutdown.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::sync::oneshot;

/// Correlation id for one pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The demand was cancelled before a value was provided.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("request was cancelled")]
pub struct RequestCanceled;

enum Resolution<T> {
    Provided(T),
    Canceled,
}

/// Correlation-id keyed pending futures for the demand/provide idiom.
pub struct RequestBridge<T> {
    pending: Mutex<HashMap<RequestId, oneshot::Sender<Resolution<T>>>>,
    next_id: AtomicU64,
}

impl<T: Send + 'static> RequestBridge<T> {
    /// An empty bridge.
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Opens a new request: returns the id to embed in the demand action
    /// and the future the requester awaits.
    pub fn demand(&self) -> (RequestId, PendingRequest<T>) {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        self.lock().insert(id, tx);
        (id, PendingRequest { rx })
    }

    /// Resolves the request with a value. Returns `false` if the id is
    /// unknown.
    pub fn provide(&self, id: RequestId, value: T) -> bool {
        match self.lock().remove(&id) {
            Some(tx) => tx.send(Resolution::Provided(value)).is_ok(),
            None => false,
        }
    }

    /// Cancels the request. Returns `false` if the id is unknown.
    pub fn cancel(&self, id: RequestId) -> bool {
        match self.lock().remove(&id) {
            Some(tx) => tx.send(Resolution::Canceled).is_ok(),
            None => false,
        }
    }

    /// Cancels every pending request (shutdown sweep).
    pub fn cancel_all(&self) {
        for (_, tx) in self.lock().drain() {
            let _ = tx.send(Resolution::Canceled);
        }
    }

    /// Number of requests still awaiting resolution.
    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RequestId, oneshot::Sender<Resolution<T>>>> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send + 'static> Default for RequestBridge<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The requester's half of one demand.
pub struct PendingRequest<T> {
    rx: oneshot::Receiver<Resolution<T>>,
}

impl<T> Future for PendingRequest<T> {
    type Output = Result<T, RequestCanceled>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx).poll(cx).map(|result| {
            match result {
                Ok(Resolution::Provided(value)) => Ok(value),
                // A dropped bridge counts as cancellation too.
                Ok(Resolution::Canceled) | Err(_) => Err(RequestCanceled),
            }
        })
    }
}
