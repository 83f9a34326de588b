//! # Catch-all event logger for debugging and demos.
//!
//! [`LogSubscriber`] writes every event it is subscribed to as a
//! structured `tracing` record. Enabled via the `logging` feature.
//!
//! Not intended for production use — implement a custom
//! [`EventSubscriber`] for metrics or audit trails.
//!
//! ## Example
//! ```rust,ignore
//! use std::sync::Arc;
//! use statevisor::LogSubscriber;
//!
//! store
//!     .subscribe_async::<MyEvent>(Arc::new(LogSubscriber::default()))
//!     .detach();
//! ```

use async_trait::async_trait;

use crate::messages::AnyEvent;
use crate::store::EventSubscriber;

/// Logs each delivered event at `debug` level with its payload type and
/// `Debug` rendering.
#[derive(Default)]
pub struct LogSubscriber;

#[async_trait]
impl EventSubscriber for LogSubscriber {
    async fn on_event(&self, event: &AnyEvent) {
        tracing::debug!(event = event.label(), payload = ?event, "event delivered");
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
