//! Timed iteration scheduler.
//!
//! - [`Scheduler`] pulls from a value source and paces releases.
//! - [`SchedulerHandle`] retunes or flushes it from producer logic.
//! - [`Snapshot`] is what the release driver yields.

mod control;
mod driver;

pub use control::SchedulerHandle;
pub use driver::{Scheduler, SchedulerState, Snapshot, Source};
