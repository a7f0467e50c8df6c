//! # Timed iteration over a value source.
//!
//! [`Scheduler`] wraps a stream of snapshots and paces how often the consumer
//! sees them.
//!
//! ## States
//! ```text
//!   Idle ──fetch──► Pulling ──(interval armed)──► WaitingTick
//!    ▲                 │                              │
//!    └──── value ──────┴──────────────────────────────┘
//!
//!   source exhausted / failed / close()  ──► Settled
//!   token fired / abort()                ──► Aborted
//! ```
//!
//! ## `next()`
//! - Returns a pending signal first (`Aborted` > `TimedOut` > `Interrupted`).
//! - Otherwise races the in-flight pull against signals and the token.
//! - A source error settles the scheduler; nothing is pulled afterwards.
//! - With a zero period, every delivered value is followed by one immediate
//!   `Interrupted`, so a consumer releasing on interruptions never starves and
//!   never spins.
//!
//! ## `next_snapshot()`
//! Drives `next()` and keeps only the most recent value, releasing it on the
//! next interruption:
//! ```text
//!   values:  v1@10ms  v2@20ms  v3@30ms         (period 50ms)
//!   ticks:                              │@50ms
//!   output:                             Value(v3)
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{BoxStream, Stream, StreamExt, StreamFuture};
use tokio_util::sync::CancellationToken;

use crate::error::ScheduleError;
use crate::events::{Bus, Event, EventKind};
use crate::scheduler::control::{Control, SchedulerHandle};

/// Boxed value source.
pub type Source<T> = BoxStream<'static, anyhow::Result<T>>;

/// Observable scheduler state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    /// No pull in flight.
    Idle,
    /// A pull is in flight and no interval is armed.
    Pulling,
    /// A pull is in flight and the interval is armed.
    WaitingTick,
    /// Source exhausted, failed or closed.
    Settled,
    /// Cancelled.
    Aborted,
}

/// What the release driver hands to the consumer.
#[derive(Clone, Debug, PartialEq)]
pub enum Snapshot<T> {
    /// Most recent value, released on a tick.
    Value(T),
    /// No value arrived before the first-value limit.
    Fallback,
    /// The source is done.
    Exhausted,
}

enum Step<T> {
    Cancelled,
    Woken,
    Pulled(Option<anyhow::Result<T>>, Source<T>),
}

/// Paces a value source.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use seqflow::{Scheduler, Snapshot};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let source = futures::stream::iter([Ok(1), Ok(2)]);
/// let mut scheduler = Scheduler::new(source, CancellationToken::new());
/// scheduler.set_delay(Duration::ZERO, None);
///
/// assert_eq!(scheduler.next_snapshot().await.unwrap(), Snapshot::Value(1));
/// assert_eq!(scheduler.next_snapshot().await.unwrap(), Snapshot::Value(2));
/// assert_eq!(scheduler.next_snapshot().await.unwrap(), Snapshot::Exhausted);
/// # }
/// ```
pub struct Scheduler<T> {
    source: Option<Source<T>>,
    pull: Option<StreamFuture<Source<T>>>,
    control: Arc<Control>,
    token: CancellationToken,
    bus: Bus,
    latest: Option<T>,
    finished: Option<SchedulerState>,
}

impl<T: Send + 'static> Scheduler<T> {
    /// Creates an idle scheduler with a zero period and no first-value limit.
    pub fn new<S>(source: S, token: CancellationToken) -> Self
    where
        S: Stream<Item = anyhow::Result<T>> + Send + 'static,
    {
        Self::with_bus(source, token, Bus::default())
    }

    /// Creates a scheduler publishing diagnostics on `bus`.
    pub fn with_bus<S>(source: S, token: CancellationToken, bus: Bus) -> Self
    where
        S: Stream<Item = anyhow::Result<T>> + Send + 'static,
    {
        Self {
            source: Some(source.boxed()),
            pull: None,
            control: Control::new(Duration::ZERO, None),
            token,
            bus,
            latest: None,
            finished: None,
        }
    }

    /// Remote control usable while `next()` is pending.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            control: Arc::clone(&self.control),
        }
    }

    pub fn set_delay(&self, delay: Duration, limit: Option<Duration>) {
        self.control.set_delay(delay, limit);
    }

    pub fn interrupt(&self) {
        self.control.interrupt();
    }

    pub fn state(&self) -> SchedulerState {
        if let Some(state) = self.finished {
            return state;
        }
        match (&self.pull, self.control.is_ticking()) {
            (None, _) => SchedulerState::Idle,
            (Some(_), false) => SchedulerState::Pulling,
            (Some(_), true) => SchedulerState::WaitingTick,
        }
    }

    /// Starts a pull if none is in flight and arms the timers. Idempotent.
    pub fn fetch(&mut self) {
        if self.finished.is_some() {
            return;
        }
        if self.pull.is_none() {
            if let Some(source) = self.source.take() {
                self.pull = Some(source.into_future());
            }
        }
        self.control.start();
    }

    /// Next value, or a scheduling signal as an error.
    ///
    /// `Ok(None)` once the source is exhausted or closed.
    pub async fn next(&mut self) -> Result<Option<T>, ScheduleError> {
        match self.finished {
            Some(SchedulerState::Settled) => return Ok(None),
            Some(_) => return Err(ScheduleError::Aborted),
            None => {}
        }
        if self.token.is_cancelled() {
            return Err(self.abort());
        }
        self.fetch();

        if let Some(sig) = self.control.take_signal() {
            return Err(self.on_signal(sig));
        }
        if self.control.take_release() {
            return Err(self.on_signal(ScheduleError::Interrupted));
        }

        let control = Arc::clone(&self.control);
        let token = self.token.clone();
        loop {
            let Some(pull) = self.pull.as_mut() else {
                return Ok(None);
            };
            let step = tokio::select! {
                biased;
                _ = token.cancelled() => Step::Cancelled,
                _ = control.wake.notified() => Step::Woken,
                (item, rest) = pull => Step::Pulled(item, rest),
            };
            match step {
                Step::Cancelled => return Err(self.abort()),
                Step::Woken => {
                    if let Some(sig) = control.take_signal() {
                        return Err(self.on_signal(sig));
                    }
                }
                Step::Pulled(item, rest) => {
                    self.pull = None;
                    return self.deliver(item, rest);
                }
            }
        }
    }

    /// Release driver: most recent value per tick.
    pub async fn next_snapshot(&mut self) -> Result<Snapshot<T>, ScheduleError> {
        loop {
            match self.next().await {
                Ok(Some(value)) => self.latest = Some(value),
                Ok(None) => {
                    return Ok(match self.latest.take() {
                        Some(value) => Snapshot::Value(value),
                        None => Snapshot::Exhausted,
                    });
                }
                Err(ScheduleError::Interrupted) => {
                    if let Some(value) = self.latest.take() {
                        return Ok(Snapshot::Value(value));
                    }
                }
                Err(ScheduleError::TimedOut) => return Ok(Snapshot::Fallback),
                Err(err) => return Err(err),
            }
        }
    }

    /// Stops the timers and drops the source, running its cleanup.
    ///
    /// Safe while a pull is in flight.
    pub fn close(&mut self) {
        if self.finished.is_some() {
            return;
        }
        self.teardown(SchedulerState::Settled);
        self.bus.publish(Event::new(EventKind::SchedulerClosed));
    }

    /// Tears the scheduler down and hands `err` back.
    pub fn throw(&mut self, err: ScheduleError) -> ScheduleError {
        let state = if err.is_abort() {
            SchedulerState::Aborted
        } else {
            SchedulerState::Settled
        };
        if self.finished.is_none() {
            self.teardown(state);
        }
        err
    }

    fn deliver(
        &mut self,
        item: Option<anyhow::Result<T>>,
        rest: Source<T>,
    ) -> Result<Option<T>, ScheduleError> {
        match item {
            Some(Ok(value)) => {
                self.source = Some(rest);
                self.control.mark_produced();
                Ok(Some(value))
            }
            Some(Err(err)) => {
                drop(rest);
                let err = ScheduleError::failed(err);
                self.bus
                    .publish(Event::new(EventKind::SourceFailed).with_reason(err.as_message()));
                self.teardown(SchedulerState::Settled);
                Err(err)
            }
            None => {
                drop(rest);
                self.teardown(SchedulerState::Settled);
                Ok(None)
            }
        }
    }

    fn on_signal(&mut self, sig: ScheduleError) -> ScheduleError {
        match sig {
            ScheduleError::Interrupted => {
                self.bus.publish(
                    Event::new(EventKind::TickInterrupted).with_delay(self.control.delay()),
                );
                sig
            }
            ScheduleError::TimedOut => {
                let ev = Event::new(EventKind::FirstValueTimeout);
                self.bus.publish(match self.control.limit() {
                    Some(limit) => ev.with_delay(limit),
                    None => ev.with_reason("manual"),
                });
                sig
            }
            _ => self.abort(),
        }
    }

    fn abort(&mut self) -> ScheduleError {
        self.teardown(SchedulerState::Aborted);
        ScheduleError::Aborted
    }

    fn teardown(&mut self, state: SchedulerState) {
        self.control.stop();
        self.pull = None;
        self.source = None;
        self.finished = Some(state);
    }
}

impl<T> std::fmt::Debug for Scheduler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("pulling", &self.pull.is_some())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
