//! Error types used by the statevisor store and worker runtime.
//!
//! This module defines three error enums:
//!
//! - [`ReducerError`] — errors raised by an individual slice reducer.
//! - [`StoreError`] — errors raised by dispatch and reducer composition.
//! - [`WorkerError`] — errors raised by the effect-loop worker.
//!
//! All types provide helper methods (`as_label`, `as_message`) for
//! logging/metrics. The module also installs the process-wide panic hook
//! ([`install_panic_hook`]) that logs panics on any OS thread with full
//! thread context before delegating to the previous hook.

use thiserror::Error;

/// # Errors produced by a single slice reducer.
///
/// Reducers are total functions over their declared action variants; these
/// errors mark the two contract violations and the app-level failure case.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ReducerError {
    /// The reducer was asked to produce state from `None` for anything
    /// other than an `InitAction`.
    #[error("reducer received {action} before initialization")]
    Initialization {
        /// Debug rendering of the offending action.
        action: String,
    },

    /// The stored slice could not be downcast to the reducer's state type.
    ///
    /// Indicates two reducers registered under the same key with different
    /// state types — a programming error, never retried.
    #[error("state slice is not a {expected}")]
    TypeMismatch {
        /// The state type the reducer expected.
        expected: &'static str,
    },

    /// Application-level reducer failure on a recognized action.
    #[error("reducer failed: {message}")]
    Failed {
        /// The underlying failure message.
        message: String,
    },
}

impl ReducerError {
    /// Creates a [`ReducerError::Failed`] from any displayable message.
    pub fn failed(message: impl Into<String>) -> Self {
        ReducerError::Failed {
            message: message.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ReducerError::Initialization { .. } => "reducer_initialization",
            ReducerError::TypeMismatch { .. } => "reducer_type_mismatch",
            ReducerError::Failed { .. } => "reducer_failed",
        }
    }

    /// True for the distinguished initialization refusal.
    pub fn is_initialization(&self) -> bool {
        matches!(self, ReducerError::Initialization { .. })
    }
}

/// # Errors produced by the store.
///
/// `Initialization` is fatal at bring-up for the named child only — the
/// service loader logs and skips it. `Reducer` propagates synchronously out
/// of `dispatch` and is never retried: it indicates a broken invariant in
/// application logic, not a transient condition.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StoreError {
    /// A child reducer refused to initialize its slice.
    #[error("slice {key:?} failed to initialize: {source}")]
    Initialization {
        /// Key of the offending child.
        key: String,
        /// The reducer's refusal.
        source: ReducerError,
    },

    /// A child reducer failed on a recognized action.
    #[error("reducer for slice {key:?} failed: {source}")]
    Reducer {
        /// Key of the failing child.
        key: String,
        /// The underlying reducer error.
        source: ReducerError,
    },

    /// `RegisterReducerAction` named a key that already exists.
    #[error("slice {key:?} is already registered")]
    DuplicateKey {
        /// The duplicate key.
        key: String,
    },

    /// `DeregisterReducerAction` named a key that does not exist.
    #[error("slice {key:?} is not registered")]
    MissingKey {
        /// The unknown key.
        key: String,
    },

    /// Dispatch was attempted after `FinishAction` was processed.
    #[error("store is finished; no further actions are accepted")]
    Finished,

    /// The worker rejected scheduled work (loop already stopping).
    #[error("effect worker unavailable: {0}")]
    Scheduler(#[from] WorkerError),
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::Initialization { .. } => "store_initialization",
            StoreError::Reducer { .. } => "store_reducer",
            StoreError::DuplicateKey { .. } => "store_duplicate_key",
            StoreError::MissingKey { .. } => "store_missing_key",
            StoreError::Finished => "store_finished",
            StoreError::Scheduler(_) => "store_scheduler",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}

/// # Errors produced by the effect-loop worker.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The worker is stopping or stopped; no further work is accepted.
    #[error("worker loop is stopped")]
    Stopped,

    /// A background job's result was lost (the blocking closure panicked
    /// or the loop shut down before bridging the result back).
    #[error("background job failed: {reason}")]
    Background {
        /// Short reason string.
        reason: &'static str,
    },
}

impl WorkerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::Stopped => "worker_stopped",
            WorkerError::Background { .. } => "worker_background",
        }
    }
}

/// Installs a process-wide panic hook that logs panics on any OS thread.
///
/// The hook records the panicking thread's name and the panic payload via
/// `tracing`, then delegates to the previously installed hook. Last-resort
/// observability, not recovery — the thread that panicked still terminates.
///
/// Safe to call more than once; each call chains onto the current hook.
pub fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let thread = std::thread::current();
        let name = thread.name().unwrap_or("unnamed");
        let payload = panic_message(info.payload());
        tracing::error!(
            thread = name,
            location = %info.location().map(|l| l.to_string()).unwrap_or_default(),
            payload = %payload,
            "thread panicked"
        );
        previous(info);
    }));
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &dyn std::any::Any) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
