//! # Diagnostic events emitted by the registry, the scheduler and the lifecycle gate.
//!
//! The [`EventKind`] enum classifies events across three categories:
//! - **Registry events**: unclaimed triggers, cancellation of pending awaits
//! - **Scheduler events**: ticks, first-value timeouts, source failures, close
//! - **Lifecycle events**: mount/unmount notifications and the abort they schedule
//!
//! The [`Event`] struct carries optional metadata such as the occurrence name,
//! a reason and a delay.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use seqflow::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TriggerUnclaimed)
//!     .with_name("click")
//!     .with_reason("nobody awaiting")
//!     .with_delay(Duration::from_millis(20));
//!
//! assert_eq!(ev.kind, EventKind::TriggerUnclaimed);
//! assert_eq!(ev.name.as_deref(), Some("click"));
//! assert_eq!(ev.delay_ms, Some(20));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of diagnostic events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `name`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `name`: subscriber name
    /// - `reason`: "full" or "closed"
    SubscriberOverflow,

    // === Registry events ===
    /// An occurrence was triggered while nobody awaited it and no retention was requested.
    ///
    /// Only published when the registry was built with `warning = true`.
    ///
    /// Sets:
    /// - `name`: occurrence name
    TriggerUnclaimed,

    /// The cancellation token fired; every pending await rejects with `Abort`.
    ///
    /// Sets:
    /// - `reason`: number of pending occurrences at the time
    RegistryAborted,

    // === Scheduler events ===
    /// The release period elapsed or a flush was requested.
    TickInterrupted,

    /// No value arrived before the first-value ceiling.
    ///
    /// Sets:
    /// - `delay_ms`: the ceiling
    FirstValueTimeout,

    /// The source returned an error; no further pulls.
    ///
    /// Sets:
    /// - `reason`: error message
    SourceFailed,

    /// The scheduler was closed and its source dropped.
    SchedulerClosed,

    // === Lifecycle events ===
    /// The gate observed a mount notification.
    Mounted,

    /// The gate observed an unmount notification.
    Unmounted,

    /// An abort was scheduled after unmount.
    ///
    /// Sets:
    /// - `delay_ms`: delay before the abort (absent when waiting on a future)
    /// - `reason`: "next_tick", "keep_for" or "keep_until"
    AbortScheduled,

    /// A pending abort was cancelled by a remount or by `keep()`.
    AbortCancelled,

    /// The gate fired its cancellation token.
    AbortFired,
}

/// Diagnostic event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Occurrence, subscriber or session name, if applicable.
    pub name: Option<Arc<str>>,
    /// Event classification.
    pub kind: EventKind,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            kind,
            at: SystemTime::now(),
            delay_ms: None,
            reason: None,
            name: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a name.
    #[inline]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_name(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_name(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::new(EventKind::Mounted);
        let b = Event::new(EventKind::Unmounted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn delay_saturates() {
        let ev = Event::new(EventKind::AbortScheduled).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }
}
