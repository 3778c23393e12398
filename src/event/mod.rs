//! Event dispatch bus
//!
//! This module decouples producers of state-change notifications from their
//! consumers:
//! - EventKind: named categories of occurrence (proxy lifecycle, traffic, ...)
//! - EventPayload: immutable key/value data attached to one occurrence
//! - EventBus: subscription registry with async (fire-and-forget) and
//!   sync (in registration order) delivery, per-handler failure isolation
//! - handlers: predefined subscribers (logging, error filter, traffic log)

mod bus;
mod kind;
mod payload;

pub mod handlers;

pub use bus::{EventBus, Handler, SubscriptionHandle};
pub use kind::EventKind;
pub use payload::{EventPayload, PayloadBuilder};
