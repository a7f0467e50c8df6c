//! # Pacing state shared between a scheduler and its handles.
//!
//! Timers and [`SchedulerHandle`]s never touch the pull; they only *raise*
//! signals. The scheduler consumes at most one signal per `next()`.
//!
//! ## Signal coalescing
//! ```text
//!   raise(Interrupted) + raise(TimedOut) ──► TimedOut
//!   raise(TimedOut)    + raise(Aborted)  ──► Aborted
//! ```
//! A signal is dropped when a stronger one is already pending.
//!
//! ## Timers
//! - **interval**: every `delay`, raises `Interrupted`; armed on the first fetch.
//! - **deadline**: once after `limit`, raises `TimedOut`; disarmed by the first value.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::ScheduleError;
use crate::time::{TimerHandle, set_interval, set_timeout};

#[derive(Default)]
struct Pacing {
    delay: Duration,
    limit: Option<Duration>,
    produced: bool,
    running: bool,
    release_next: bool,
    signal: Option<ScheduleError>,
    interval: Option<TimerHandle>,
    deadline: Option<TimerHandle>,
}

impl Pacing {
    fn coalesce(&mut self, sig: ScheduleError) {
        match &self.signal {
            Some(cur) if cur.rank() >= sig.rank() => {}
            _ => self.signal = Some(sig),
        }
    }

    fn cancel_timers(&mut self) {
        if let Some(t) = self.interval.take() {
            t.cancel();
        }
        if let Some(t) = self.deadline.take() {
            t.cancel();
        }
    }
}

pub(crate) struct Control {
    pacing: Mutex<Pacing>,
    pub(crate) wake: Notify,
}

impl Control {
    pub(crate) fn new(delay: Duration, limit: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            pacing: Mutex::new(Pacing {
                delay,
                limit,
                ..Pacing::default()
            }),
            wake: Notify::new(),
        })
    }

    pub(crate) fn raise(&self, sig: ScheduleError) {
        self.pacing.lock().coalesce(sig);
        self.wake.notify_one();
    }

    pub(crate) fn take_signal(&self) -> Option<ScheduleError> {
        self.pacing.lock().signal.take()
    }

    /// One-shot release owed after a value when no interval runs.
    pub(crate) fn take_release(&self) -> bool {
        std::mem::take(&mut self.pacing.lock().release_next)
    }

    /// Arms timers on the first fetch.
    pub(crate) fn start(self: &Arc<Self>) {
        let mut p = self.pacing.lock();
        if p.running {
            return;
        }
        p.running = true;
        p.interval = self.interval_for(p.delay);
        if !p.produced {
            p.deadline = p.limit.map(|limit| self.deadline_after(limit));
        }
    }

    pub(crate) fn stop(&self) {
        let mut p = self.pacing.lock();
        p.running = false;
        p.release_next = false;
        p.cancel_timers();
    }

    pub(crate) fn mark_produced(&self) {
        let mut p = self.pacing.lock();
        p.produced = true;
        if let Some(t) = p.deadline.take() {
            t.cancel();
        }
        if p.delay.is_zero() {
            p.release_next = true;
        }
    }

    pub(crate) fn is_ticking(&self) -> bool {
        self.pacing.lock().interval.is_some()
    }

    pub(crate) fn delay(&self) -> Duration {
        self.pacing.lock().delay
    }

    pub(crate) fn limit(&self) -> Option<Duration> {
        self.pacing.lock().limit
    }

    /// Swaps the period (and first-value limit) atomically.
    ///
    /// A zero period raises `Interrupted` right away once running.
    pub(crate) fn set_delay(self: &Arc<Self>, delay: Duration, limit: Option<Duration>) {
        let flush = {
            let mut p = self.pacing.lock();
            p.delay = delay;
            p.limit = limit;
            if p.running {
                if let Some(t) = p.interval.take() {
                    t.cancel();
                }
                p.interval = self.interval_for(delay);
                if !p.produced {
                    if let Some(t) = p.deadline.take() {
                        t.cancel();
                    }
                    p.deadline = limit.map(|limit| self.deadline_after(limit));
                }
            }
            p.running && delay.is_zero()
        };
        if flush {
            self.raise(ScheduleError::Interrupted);
        }
    }

    /// Manual tick: a timeout before the first value, an interruption after.
    pub(crate) fn interrupt(&self) {
        let sig = if self.pacing.lock().produced {
            ScheduleError::Interrupted
        } else {
            ScheduleError::TimedOut
        };
        self.raise(sig);
    }

    fn interval_for(self: &Arc<Self>, delay: Duration) -> Option<TimerHandle> {
        if delay.is_zero() {
            return None;
        }
        let weak = Arc::downgrade(self);
        Some(set_interval(delay, move || {
            raise_on(&weak, ScheduleError::Interrupted)
        }))
    }

    fn deadline_after(self: &Arc<Self>, limit: Duration) -> TimerHandle {
        let weak = Arc::downgrade(self);
        set_timeout(limit, move || raise_on(&weak, ScheduleError::TimedOut))
    }
}

impl Drop for Control {
    fn drop(&mut self) {
        self.pacing.get_mut().cancel_timers();
    }
}

fn raise_on(control: &Weak<Control>, sig: ScheduleError) {
    if let Some(control) = control.upgrade() {
        control.raise(sig);
    }
}

/// Cloneable remote for a [`Scheduler`](crate::Scheduler).
///
/// Lets producer logic retune the period or flush while the consumer is
/// suspended in `next()`.
#[derive(Clone)]
pub struct SchedulerHandle {
    pub(crate) control: Arc<Control>,
}

impl SchedulerHandle {
    /// Sets the release period and the first-value limit.
    ///
    /// `Duration::ZERO` releases every value and wakes a pending `next()` now.
    pub fn set_delay(&self, delay: Duration, limit: Option<Duration>) {
        self.control.set_delay(delay, limit);
    }

    /// Fires the tick now.
    pub fn interrupt(&self) {
        self.control.interrupt();
    }

    /// Makes the pending (or next) `next()` fail with [`ScheduleError::Aborted`].
    pub fn abort(&self) {
        self.control.raise(ScheduleError::Aborted);
    }

    /// Current release period.
    pub fn delay(&self) -> Duration {
        self.control.delay()
    }
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("delay", &self.control.delay())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stronger_signals_win() {
        let control = Control::new(Duration::ZERO, None);
        control.raise(ScheduleError::Interrupted);
        control.raise(ScheduleError::TimedOut);
        control.raise(ScheduleError::Interrupted);
        assert!(matches!(control.take_signal(), Some(ScheduleError::TimedOut)));
        assert!(control.take_signal().is_none());

        control.raise(ScheduleError::Aborted);
        control.raise(ScheduleError::TimedOut);
        assert!(matches!(control.take_signal(), Some(ScheduleError::Aborted)));
    }

    #[test]
    fn manual_interrupt_depends_on_first_value() {
        let control = Control::new(Duration::ZERO, None);
        control.interrupt();
        assert!(matches!(control.take_signal(), Some(ScheduleError::TimedOut)));

        control.mark_produced();
        control.interrupt();
        assert!(matches!(control.take_signal(), Some(ScheduleError::Interrupted)));
    }

    #[test]
    fn zero_delay_owes_one_release_per_value() {
        let control = Control::new(Duration::ZERO, None);
        control.mark_produced();
        assert!(control.take_release());
        assert!(!control.take_release());
    }

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn interval_restarts_on_new_delay() {
        let control = Control::new(Duration::from_millis(50), None);
        control.start();
        assert!(control.is_ticking());

        tokio::time::advance(Duration::from_millis(30)).await;
        control.set_delay(Duration::from_millis(40), None);
        tokio::time::advance(Duration::from_millis(25)).await;
        settle().await;
        assert!(control.take_signal().is_none());

        tokio::time::advance(Duration::from_millis(15)).await;
        settle().await;
        assert!(matches!(control.take_signal(), Some(ScheduleError::Interrupted)));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_stops_ticking_and_interrupts() {
        let control = Control::new(Duration::from_millis(50), None);
        control.start();
        control.set_delay(Duration::ZERO, None);
        assert!(!control.is_ticking());
        assert!(matches!(control.take_signal(), Some(ScheduleError::Interrupted)));
    }
}
