//! # Service manifest: compile-time plugin registry.
//!
//! Services extend a running application with their own state slice and
//! side effects. Instead of filesystem discovery and dynamic imports, the
//! application lists its services in a static manifest of
//! [`ServiceDescriptor`]s; [`load_services`] walks the manifest, attaches
//! each reducer through `RegisterReducerAction`, and runs each setup hook
//! with a [`ServiceContext`].
//!
//! ## Rules
//! - A service that fails to register or set up is **logged and skipped**;
//!   bring-up of the rest of the application continues.
//! - Registration order is manifest order, which fixes the service's
//!   position in the reducer iteration order.
//! - Setup hooks run after the service's slice exists, so they may
//!   subscribe, autorun, and dispatch immediately.

use crate::error::StoreError;
use crate::reducer::SliceReducer;
use crate::store::Store;
use crate::worker::WorkerHandle;

use thiserror::Error;

/// Failure of one service during bring-up.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The service's reducer could not be registered.
    #[error("registration failed: {0}")]
    Registration(#[from] StoreError),

    /// The service's setup hook reported a failure.
    #[error("setup failed: {message}")]
    Setup {
        /// The hook's failure message.
        message: String,
    },
}

impl ServiceError {
    /// Creates a [`ServiceError::Setup`] from any displayable message.
    pub fn setup(message: impl Into<String>) -> Self {
        ServiceError::Setup {
            message: message.into(),
        }
    }
}

/// Everything a service needs at setup time.
#[derive(Clone)]
pub struct ServiceContext {
    /// The application store.
    pub store: Store,
    /// Handle to the effect worker for scheduling service tasks.
    pub worker: WorkerHandle,
}

/// One entry of the service manifest.
pub struct ServiceDescriptor {
    /// Stable identifier; doubles as the service's root-state key when a
    /// reducer is present.
    pub id: &'static str,
    /// Builds the service's reducer, if it owns state.
    pub reducer: Option<fn() -> SliceReducer>,
    /// Wires the service's side effects (subscriptions, tasks).
    pub setup: Option<fn(&ServiceContext) -> Result<(), ServiceError>>,
}

/// Loads every service in manifest order.
///
/// Per-service failures are logged and skipped — a broken plugin must not
/// take the application down. Returns each service's outcome so callers
/// can surface them (e.g. a diagnostics screen).
pub fn load_services(
    store: &Store,
    manifest: &[ServiceDescriptor],
) -> Vec<(&'static str, Result<(), ServiceError>)> {
    let context = ServiceContext {
        store: store.clone(),
        worker: store.worker(),
    };

    manifest
        .iter()
        .map(|descriptor| {
            let outcome = load_one(&context, descriptor);
            if let Err(err) = &outcome {
                tracing::error!(service = descriptor.id, error = %err, "service skipped");
            } else {
                tracing::debug!(service = descriptor.id, "service loaded");
            }
            (descriptor.id, outcome)
        })
        .collect()
}

fn load_one(context: &ServiceContext, descriptor: &ServiceDescriptor) -> Result<(), ServiceError> {
    if let Some(reducer) = descriptor.reducer {
        context.store.register_reducer(descriptor.id, reducer())?;
    }
    if let Some(setup) = descriptor.setup {
        setup(context)?;
    }
    Ok(())
}
