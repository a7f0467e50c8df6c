//! # Diagnostic subscribers.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`] fan-out
//! used by a [`Session`](crate::Session) to deliver events published on the
//! [`Bus`](crate::Bus).
//!
//! ## Architecture
//! ```text
//!   Registry / Scheduler / Gate ── publish(Event) ──► Bus ──► session listener
//!                                                                  │
//!                                                       SubscriberSet::emit(&Event)
//!                                                        ┌─────────┼─────────┐
//!                                                        ▼         ▼         ▼
//!                                                    LogWriter  Metrics   Custom
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
