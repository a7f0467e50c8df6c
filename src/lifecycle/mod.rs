//! Lifecycle gate: debounced mount/unmount turned into one cancellation.
//!
//! - [`LifecycleGate`] owns the cancellation token.
//! - [`Retain`] is what a cleanup uses to postpone or cancel the abort.

mod gate;
mod retain;

pub use gate::{Cleanup, Effect, GateConfig, LifecycleGate, MULTI_THREAD_GRACE};
pub use retain::Retain;
