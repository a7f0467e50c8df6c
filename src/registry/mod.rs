//! Event registry: named occurrences, their futures and combinators.
//!
//! - [`Registry`] is the namespace; [`Registry::on`] gives a [`Trigger`],
//!   [`Registry::eventual`] gives an [`Eventual`].
//! - [`Chain`] composes eventuals with `or` / `and`; [`Merged`] is its result.
//! - [`TimeoutBuilder`] / [`Timed`] / [`Within`] attach a deadline.
//! - [`preserving`], [`important`] and [`throwing`] shape what an emit does.
//!
//! ```text
//!  producer ── on("n").emit(v) ──►  Registry  ◄── eventual("n").await ── consumer
//!                                      │
//!                          CancellationToken fired
//!                                      ▼
//!                      every pending eventual rejects (Abort)
//! ```

mod chain;
mod eventual;
mod namespace;
mod payload;
mod timed;
mod trigger;

pub use chain::{Chain, Merged};
pub use eventual::Eventual;
pub use namespace::{Registry, RegistryConfig};
pub use payload::{ErrorRecord, Payload, Retention, Thrown, important, preserving, throwing};
pub use timed::{Timed, TimeoutBuilder, Within};
pub use trigger::{HANDLER_CACHE_CAP, Handler, Trigger};

/// Values carried by occurrences.
///
/// Shared futures hand a clone to every awaiter.
pub trait Value: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Value for T {}
