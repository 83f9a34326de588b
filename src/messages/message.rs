//! # Message erasure trait.
//!
//! Services declare their own action/event types as plain structs or enums;
//! the store moves them around behind `Arc<dyn Message>` envelopes and each
//! reducer/subscriber downcasts back to the concrete types it knows.
//!
//! ## Rules
//! - Payloads are **immutable**: the envelope hands out `&T` only.
//! - Any `Debug + Send + Sync + 'static` type is a message — the blanket
//!   impl below means there is nothing to derive or register.
//! - Unknown message types fall through untouched: a reducer that does not
//!   recognize an action returns identity, a subscriber only sees the event
//!   type it registered for.

use std::any::Any;
use std::fmt;

/// Erasure trait for action and event payloads.
///
/// Implemented automatically for every `Debug + Send + Sync + 'static`
/// type; do not implement it manually.
pub trait Message: Any + Send + Sync + fmt::Debug {
    /// Upcast for downcasting back to the concrete payload type.
    fn as_any(&self) -> &dyn Any;

    /// Short type name of the concrete payload, for logs.
    fn label(&self) -> &'static str;
}

impl<T: Any + Send + Sync + fmt::Debug> Message for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn label(&self) -> &'static str {
        let full = std::any::type_name::<T>();
        full.rsplit("::").next().unwrap_or(full)
    }
}
