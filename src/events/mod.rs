//! Diagnostic events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Registry` (unclaimed triggers, abort), `Scheduler` (ticks,
//!   timeouts, failures), `LifecycleGate` (mount/unmount/abort), `SubscriberSet`
//!   workers (overflow/panic).
//! - **Consumers**: the session listener, which fans out to a `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
