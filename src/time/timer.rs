//! # One-shot, repeating and next-tick callbacks.
//!
//! Every scheduling primitive returns a [`TimerHandle`]. The callback runs on a
//! spawned tokio task; the handle cancels it.
//!
//! ## Rules
//! - `cancel()` is idempotent and wins against a task that already woke up:
//!   the armed flag is checked right before the callback runs.
//! - A one-shot handle disarms itself when its callback runs.
//! - Dropping a handle does **not** cancel it; callers keep the handle and cancel
//!   it on their success path.
//! - "Next tick" means the next turn of the scheduler: on a current-thread runtime
//!   the callback cannot run before the caller yields, so a same-tick `cancel()`
//!   always prevents it.
//!
//! ```text
//! set_timeout(d, f)    ──► spawn { sleep(d); if armed.swap(false) { f() } }
//! set_interval(p, f)   ──► spawn { loop { tick(p); if armed { f() } } }
//! next_tick(f)         ──► spawn { if armed.swap(false) { f() } }
//! when_settled(fut, f) ──► spawn { fut.await; if armed.swap(false) { f() } }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::{self, MissedTickBehavior};

/// Cancellation handle for a scheduled callback.
#[derive(Debug)]
pub struct TimerHandle {
    armed: Arc<AtomicBool>,
    task: AbortHandle,
}

impl TimerHandle {
    /// Stops the callback from ever running again.
    pub fn cancel(&self) {
        self.armed.store(false, Ordering::Release);
        self.task.abort();
    }

    /// True while the callback may still run.
    pub fn is_active(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }
}

fn spawn_once<Fut, F>(wait: Fut, f: F) -> TimerHandle
where
    Fut: Future + Send + 'static,
    F: FnOnce() + Send + 'static,
{
    let armed = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&armed);
    let join = tokio::spawn(async move {
        wait.await;
        if flag.swap(false, Ordering::AcqRel) {
            f();
        }
    });
    TimerHandle {
        armed,
        task: join.abort_handle(),
    }
}

/// Runs `f` once after `delay`.
pub fn set_timeout<F>(delay: Duration, f: F) -> TimerHandle
where
    F: FnOnce() + Send + 'static,
{
    spawn_once(time::sleep(delay), f)
}

/// Runs `f` every `period`, first after one full period.
///
/// A zero period is clamped to one millisecond.
pub fn set_interval<F>(period: Duration, mut f: F) -> TimerHandle
where
    F: FnMut() + Send + 'static,
{
    let period = period.max(Duration::from_millis(1));
    let armed = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&armed);
    let start = time::Instant::now() + period;
    let join = tokio::spawn(async move {
        let mut ticker = time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if !flag.load(Ordering::Acquire) {
                break;
            }
            f();
        }
    });
    TimerHandle {
        armed,
        task: join.abort_handle(),
    }
}

/// Runs `f` on the next turn of the scheduler.
pub fn next_tick<F>(f: F) -> TimerHandle
where
    F: FnOnce() + Send + 'static,
{
    spawn_once(tokio::task::yield_now(), f)
}

/// Runs `f` once `fut` completes.
pub fn when_settled<Fut, F>(fut: Fut, f: F) -> TimerHandle
where
    Fut: Future + Send + 'static,
    F: FnOnce() + Send + 'static,
{
    spawn_once(fut, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
        let c = Arc::new(AtomicUsize::new(0));
        let read = {
            let c = Arc::clone(&c);
            move || c.load(Ordering::SeqCst)
        };
        (c, read)
    }

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fires_once_after_delay() {
        let (c, read) = counter();
        let h = set_timeout(Duration::from_millis(20), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        time::advance(Duration::from_millis(19)).await;
        settle().await;
        assert_eq!(read(), 0);
        assert!(h.is_active());

        time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(read(), 1);
        assert!(!h.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timeout_never_fires() {
        let (c, read) = counter();
        let h = set_timeout(Duration::from_millis(20), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        h.cancel();
        h.cancel();

        time::advance(Duration::from_millis(50)).await;
        settle().await;
        assert_eq!(read(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_repeats_until_cancelled() {
        let (c, read) = counter();
        let h = set_interval(Duration::from_millis(10), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..3 {
            time::advance(Duration::from_millis(10)).await;
            settle().await;
        }
        assert_eq!(read(), 3);

        h.cancel();
        time::advance(Duration::from_millis(30)).await;
        settle().await;
        assert_eq!(read(), 3);
    }

    #[tokio::test]
    async fn next_tick_can_be_cancelled_in_the_same_tick() {
        let (c1, read1) = counter();
        let (c2, read2) = counter();
        let cancelled = next_tick(move || {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        let _kept = next_tick(move || {
            c2.fetch_add(1, Ordering::SeqCst);
        });
        cancelled.cancel();

        settle().await;
        assert_eq!(read1(), 0);
        assert_eq!(read2(), 1);
    }

    #[tokio::test]
    async fn when_settled_waits_for_the_future() {
        let (c, read) = counter();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let _h = when_settled(rx, move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        settle().await;
        assert_eq!(read(), 0);

        tx.send(()).unwrap();
        settle().await;
        assert_eq!(read(), 1);
    }
}
