//! # seqflow
//!
//! **seqflow** is a cooperative coordination layer for async Rust.
//!
//! Producer logic signals named occurrences and yields snapshots over time; a
//! consumer awaits occurrences, combines them, and pulls snapshots at a
//! controlled cadence. One cancellation token, owned by a debounced lifecycle
//! gate, unwinds everything.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   on_mount() / on_unmount()
//!            │
//!            ▼
//! ┌──────────────────────┐   token   ┌───────────────────────────────────────┐
//! │    LifecycleGate     │──────────►│  Registry<T>                          │
//! │ - debounced abort    │           │  - on(name)       ─► Trigger          │
//! │ - keep / keep_for /  │           │  - eventual(name) ─► Eventual         │
//! │   keep_until         │           │  - or / and       ─► Chain ─► Merged  │
//! │ - mounted flag       │           │  - within(n).unit ─► Timed ─► Within  │
//! └──────────┬───────────┘           └───────────────────┬───────────────────┘
//!            │ token                                     │
//!            ▼                                           │
//! ┌──────────────────────┐                               │
//! │    Scheduler<U>      │◄── SchedulerHandle            │
//! │ - fetch / next       │    (set_delay, interrupt,     │
//! │ - next_snapshot      │     abort)                    │
//! │ - close / throw      │                               │
//! └──────────┬───────────┘                               │
//!            │ Publishes events                          │ Publishes events
//!            ▼                                           ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                          │
//! │                     (capacity: Config::bus_capacity)                    │
//! └────────────────────────────────────┬────────────────────────────────────┘
//!                                      ▼
//!                          ┌────────────────────────┐
//!                          │  subscriber_listener   │
//!                          │     (in Session)       │
//!                          └───────────┬────────────┘
//!                                      ▼
//!                                SubscriberSet
//!                              (per-sub queues)
//!                          ┌───────────┼───────────┐
//!                          ▼           ▼           ▼
//!                       worker1     worker2     workerN
//! ```
//!
//! ### Release cadence
//! ```text
//! source:   v1   v2   v3                  v4
//!           │    │    │                   │
//! time:  0──10───20───30───────50─────────70──────100──►
//! ticks:                       │                   │
//! output:                      v3                  v4
//!
//! interrupt() at any point ─► latest value now (or Fallback before the first)
//! set_delay(0)             ─► every value, each followed by one Interrupted
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types                                  |
//! |-------------------|----------------------------------------------------------|--------------------------------------------|
//! | **Registry**      | Named occurrences, shared futures, stable handlers       | [`Registry`], [`Trigger`], [`Eventual`]    |
//! | **Combinators**   | `or` / `and` chains and deadlines                        | [`Chain`], [`Merged`], [`Timed`], [`Within`] |
//! | **Scheduler**     | Paced pulls from a value stream                          | [`Scheduler`], [`SchedulerHandle`]         |
//! | **Lifecycle**     | Debounced mount/unmount to one cancellation              | [`LifecycleGate`], [`Retain`]              |
//! | **Timers**        | Cancellable timeouts, intervals, next-tick callbacks     | [`set_timeout`], [`TimerHandle`]           |
//! | **Subscriber API**| Hook into diagnostic events                              | [`Subscribe`], [`SubscriberSet`]           |
//! | **Errors**        | Typed errors for cancellation, pacing and misuse         | [`EventError`], [`ScheduleError`], [`UsageError`] |
//! | **Configuration** | Centralize session settings                              | [`Config`], [`SessionBuilder`]             |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use seqflow::{Config, SessionBuilder, Snapshot, Within};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Build subscribers (optional)
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn seqflow::Subscribe>> = vec![Arc::new(seqflow::LogWriter::default())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn seqflow::Subscribe>> = Vec::new();
//!
//!     let session = SessionBuilder::new(Config::default())
//!         .with_subscribers(subs)
//!         .build::<String>();
//!     session.gate().on_mount();
//!
//!     // Wait for two occurrences, but not forever.
//!     let registry = session.registry();
//!     let both = registry.eventual("user").and("settings").within(1).seconds()?;
//!     registry.on("user").emit("ada".to_string());
//!     registry.on("settings").emit("dark".to_string());
//!     if let Within::Settled(merged) = both.await {
//!         println!("{:?}", merged?.get("user"));
//!     }
//!
//!     // Pull snapshots from a stream.
//!     let source = futures::stream::iter([Ok(1), Ok(2), Ok(3)]);
//!     let mut scheduler = session.pace(source);
//!     scheduler.set_delay(Duration::ZERO, None);
//!     while let Snapshot::Value(v) = scheduler.next_snapshot().await? {
//!         println!("snapshot {v}");
//!     }
//!
//!     session.shutdown().await;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod lifecycle;
mod registry;
mod scheduler;
mod subscribers;
mod time;

// ---- Public re-exports ----

pub use core::{Config, Session, SessionBuilder, abortable};
pub use error::{EventError, ScheduleError, UsageError};
pub use events::{Bus, Event, EventKind};
pub use lifecycle::{Cleanup, Effect, GateConfig, LifecycleGate, MULTI_THREAD_GRACE, Retain};
pub use registry::{
    Chain, ErrorRecord, Eventual, HANDLER_CACHE_CAP, Handler, Merged, Payload, Registry,
    RegistryConfig, Retention, Thrown, Timed, TimeoutBuilder, Trigger, Value, Within, important,
    preserving, throwing,
};
pub use scheduler::{Scheduler, SchedulerHandle, SchedulerState, Snapshot, Source};
pub use subscribers::{Subscribe, SubscriberSet};
pub use time::{TimeUnit, TimerHandle, next_tick, set_interval, set_timeout, when_settled};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
