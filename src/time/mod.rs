//! Timer primitives.
//!
//! - [`set_timeout`], [`set_interval`], [`next_tick`], [`when_settled`] schedule
//!   callbacks and return a [`TimerHandle`] that cancels them.
//! - [`TimeUnit`] names the units accepted by timeout attachment.
//!
//! All timers run on tokio's clock, so tests drive them with a paused clock
//! (`#[tokio::test(start_paused = true)]` + `tokio::time::advance`).

mod timer;
mod unit;

pub use timer::{TimerHandle, next_tick, set_interval, set_timeout, when_settled};
pub use unit::TimeUnit;
