//! # Debounced mount/unmount bridge.
//!
//! [`LifecycleGate`] turns a noisy stream of `on_mount` / `on_unmount` calls into
//! at most one cancellation of its token.
//!
//! ```text
//!  on_unmount() ──► schedule abort (next tick or debounce) ──► token.cancel()
//!       │                     ▲
//!       │                     └── on_mount() in between cancels it
//!       └──► cleanup(&mut Retain) may keep / keep_for / keep_until
//! ```
//!
//! ## Rules
//! - An unmount immediately followed by a mount (same tick) never cancels.
//! - The mounted flag flips on the next tick, so a same-tick flip-flop is invisible.
//! - The effect runs on every mount; its cleanup runs on the following unmount.
//! - Once the token fired, the gate is spent: further calls are ignored.
//! - Every mount bumps a generation; a scheduled abort only fires if no mount
//!   happened since the unmount that scheduled it. The check runs under the
//!   state lock, so a remount racing the abort on another worker wins.
//! - "Next tick" is only meaningful on a current-thread runtime. Elsewhere a
//!   zero debounce becomes [`MULTI_THREAD_GRACE`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::core::abortable;
use crate::error::{EventError, UsageError};
use crate::events::{Bus, Event, EventKind};
use crate::lifecycle::retain::{Keep, Retain};
use crate::time::{TimerHandle, next_tick, set_timeout, when_settled};

/// Teardown callback returned by an effect.
pub type Cleanup = Box<dyn FnOnce(&mut Retain) -> Result<(), UsageError> + Send>;

/// Side effect run on every mount.
pub type Effect = Box<dyn FnMut() -> Option<Cleanup> + Send>;

/// Default abort delay on runtimes where other workers can run the abort
/// before the unmounting caller reaches its next statement.
pub const MULTI_THREAD_GRACE: Duration = Duration::from_millis(5);

/// Gate settings.
#[derive(Clone, Copy, Debug, Default)]
pub struct GateConfig {
    /// Delay before the default abort fires; zero means the next tick
    /// ([`MULTI_THREAD_GRACE`] on a multi-thread runtime).
    pub debounce: Duration,
}

#[derive(Default)]
struct GateState {
    abort: Option<TimerHandle>,
    mount: Option<TimerHandle>,
    unmount_reset: Option<TimerHandle>,
    effect: Option<Effect>,
    cleanup: Option<Cleanup>,
    generation: u64,
}

impl GateState {
    fn cancel_abort(&mut self) -> bool {
        match self.abort.take() {
            Some(t) => {
                let active = t.is_active();
                t.cancel();
                active
            }
            None => false,
        }
    }
}

struct Shared {
    state: Mutex<GateState>,
    token: CancellationToken,
    mounted: watch::Sender<bool>,
    bus: Bus,
    config: GateConfig,
}

/// Mount/unmount to cancellation bridge.
///
/// # Example
/// ```
/// use seqflow::{GateConfig, LifecycleGate};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let gate = LifecycleGate::new(GateConfig::default());
/// gate.on_mount();
/// gate.on_unmount().unwrap();
/// gate.on_mount(); // same tick: the abort is called off
///
/// tokio::task::yield_now().await;
/// assert!(!gate.token().is_cancelled());
/// # }
/// ```
#[derive(Clone)]
pub struct LifecycleGate {
    shared: Arc<Shared>,
}

impl LifecycleGate {
    pub fn new(config: GateConfig) -> Self {
        Self::with_bus(config, Bus::default())
    }

    /// Creates a gate publishing lifecycle events on `bus`.
    pub fn with_bus(config: GateConfig, bus: Bus) -> Self {
        let (mounted, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(GateState::default()),
                token: CancellationToken::new(),
                mounted,
                bus,
                config,
            }),
        }
    }

    /// Token cancelled when the gate tears down.
    pub fn token(&self) -> CancellationToken {
        self.shared.token.clone()
    }

    pub fn is_mounted(&self) -> bool {
        *self.shared.mounted.borrow()
    }

    /// Resolves once the gate is mounted; rejects with
    /// [`EventError::Abort`] if the token fires first.
    pub fn mounted(&self) -> impl Future<Output = Result<(), EventError>> + Send + 'static {
        let mut rx = self.shared.mounted.subscribe();
        abortable(self.shared.token.clone(), async move {
            rx.wait_for(|m| *m)
                .await
                .map(|_| ())
                .map_err(|_| EventError::Abort)
        })
    }

    /// Registers the effect run on every mount.
    pub fn set_effect<F>(&self, effect: F)
    where
        F: FnMut() -> Option<Cleanup> + Send + 'static,
    {
        self.shared.state.lock().effect = Some(Box::new(effect));
    }

    pub fn on_mount(&self) {
        if self.shared.token.is_cancelled() {
            return;
        }
        let mut effect = {
            let mut st = self.shared.state.lock();
            if self.shared.token.is_cancelled() {
                return;
            }
            st.generation += 1;
            if st.cancel_abort() {
                self.shared.bus.publish(Event::new(EventKind::AbortCancelled));
            }
            if let Some(t) = st.unmount_reset.take() {
                t.cancel();
            }
            if let Some(t) = st.mount.take() {
                t.cancel();
            }
            let shared = Arc::clone(&self.shared);
            st.mount = Some(next_tick(move || {
                if !shared.mounted.send_replace(true) {
                    shared.bus.publish(Event::new(EventKind::Mounted));
                }
            }));
            st.effect.take()
        };

        let cleanup = effect.as_mut().and_then(|f| f());

        let mut st = self.shared.state.lock();
        if st.effect.is_none() {
            st.effect = effect;
        }
        if cleanup.is_some() {
            st.cleanup = cleanup;
        }
    }

    /// Runs the cleanup and schedules the abort it negotiated.
    ///
    /// Returns [`UsageError::DuplicateKeep`] when the cleanup picked more than one
    /// keep option, even if it ignored the error itself. The first pick applies.
    pub fn on_unmount(&self) -> Result<(), UsageError> {
        if self.shared.token.is_cancelled() {
            return Ok(());
        }
        let cleanup = {
            let mut st = self.shared.state.lock();
            if let Some(t) = st.mount.take() {
                t.cancel();
            }
            if let Some(t) = st.unmount_reset.take() {
                t.cancel();
            }
            let shared = Arc::clone(&self.shared);
            st.unmount_reset = Some(next_tick(move || {
                if shared.mounted.send_replace(false) {
                    shared.bus.publish(Event::new(EventKind::Unmounted));
                }
            }));
            st.cleanup.take()
        };

        let mut retain = Retain::default();
        let outcome = match cleanup {
            Some(cleanup) => cleanup(&mut retain),
            None => Ok(()),
        };
        let (choice, conflict) = retain.into_parts();

        let mut st = self.shared.state.lock();
        st.cancel_abort();
        let generation = st.generation;
        st.abort = self.schedule_abort(choice, generation);
        drop(st);

        if conflict {
            return Err(UsageError::DuplicateKeep);
        }
        outcome
    }

    fn schedule_abort(&self, choice: Option<Keep>, generation: u64) -> Option<TimerHandle> {
        let fire = {
            let shared = Arc::clone(&self.shared);
            move || {
                let st = shared.state.lock();
                if st.generation != generation {
                    return;
                }
                shared.token.cancel();
                drop(st);
                shared.bus.publish(Event::new(EventKind::AbortFired));
            }
        };
        let scheduled = |reason: &'static str| {
            Event::new(EventKind::AbortScheduled).with_reason(reason)
        };

        let handle = match choice {
            Some(Keep::Forever) => return None,
            Some(Keep::For(delay)) => {
                self.shared
                    .bus
                    .publish(scheduled("keep_for").with_delay(delay));
                set_timeout(delay, fire)
            }
            Some(Keep::Until(fut)) => {
                self.shared.bus.publish(scheduled("keep_until"));
                when_settled(fut, fire)
            }
            None if self.debounce().is_zero() => {
                self.shared.bus.publish(scheduled("next_tick"));
                next_tick(fire)
            }
            None => {
                let debounce = self.debounce();
                self.shared
                    .bus
                    .publish(scheduled("debounce").with_delay(debounce));
                set_timeout(debounce, fire)
            }
        };
        Some(handle)
    }

    fn debounce(&self) -> Duration {
        let debounce = self.shared.config.debounce;
        let current_thread = Handle::try_current()
            .map(|h| h.runtime_flavor() == RuntimeFlavor::CurrentThread)
            .unwrap_or(true);
        if debounce.is_zero() && !current_thread {
            MULTI_THREAD_GRACE
        } else {
            debounce
        }
    }
}

impl fmt::Debug for LifecycleGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleGate")
            .field("mounted", &self.is_mounted())
            .field("cancelled", &self.shared.token.is_cancelled())
            .field("config", &self.shared.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time;

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    fn gate() -> LifecycleGate {
        LifecycleGate::new(GateConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn same_tick_remount_never_cancels() {
        let gate = gate();
        gate.on_mount();
        settle().await;

        gate.on_unmount().unwrap();
        gate.on_mount();
        time::advance(Duration::from_secs(1)).await;
        settle().await;

        assert!(!gate.token().is_cancelled());
        assert!(gate.is_mounted());
    }

    #[tokio::test]
    async fn unmount_alone_cancels_on_the_next_tick() {
        let gate = gate();
        gate.on_mount();
        settle().await;
        assert!(gate.is_mounted());

        gate.on_unmount().unwrap();
        assert!(!gate.token().is_cancelled());
        settle().await;
        assert!(gate.token().is_cancelled());
        assert!(!gate.is_mounted());
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_delays_the_abort() {
        let gate = LifecycleGate::new(GateConfig {
            debounce: Duration::from_millis(100),
        });
        gate.on_unmount().unwrap();

        time::advance(Duration::from_millis(99)).await;
        settle().await;
        assert!(!gate.token().is_cancelled());

        time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert!(gate.token().is_cancelled());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_tick_remount_never_cancels_on_worker_threads() {
        for _ in 0..500 {
            let gate = gate();
            gate.on_mount();
            gate.on_unmount().unwrap();
            gate.on_mount();
            time::sleep(Duration::from_millis(1)).await;
            assert!(!gate.token().is_cancelled());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn unmount_alone_cancels_on_worker_threads() {
        let gate = gate();
        gate.on_mount();
        gate.on_unmount().unwrap();
        time::timeout(Duration::from_secs(1), gate.token().cancelled())
            .await
            .unwrap();
        assert!(gate.token().is_cancelled());
    }

    #[tokio::test]
    async fn remount_after_the_abort_fired_is_ignored() {
        let gate = gate();
        gate.on_mount();
        gate.on_unmount().unwrap();
        settle().await;
        assert!(gate.token().is_cancelled());

        gate.on_mount();
        settle().await;
        assert!(gate.token().is_cancelled());
        assert!(!gate.is_mounted());
    }

    #[tokio::test]
    async fn two_keep_options_fail_the_unmount() {
        let gate = gate();
        gate.set_effect(|| {
            Some(Box::new(|retain: &mut Retain| {
                retain.keep()?;
                retain.keep_for(Duration::from_millis(50))
            }))
        });
        gate.on_mount();
        assert_eq!(gate.on_unmount(), Err(UsageError::DuplicateKeep));
    }

    #[tokio::test]
    async fn swallowed_duplicate_keep_is_still_reported() {
        let gate = gate();
        gate.set_effect(|| {
            Some(Box::new(|retain: &mut Retain| -> Result<(), UsageError> {
                retain.keep()?;
                let _ = retain.keep_for(Duration::from_millis(50));
                Ok(())
            }))
        });
        gate.on_mount();
        assert_eq!(gate.on_unmount(), Err(UsageError::DuplicateKeep));

        settle().await;
        assert!(!gate.token().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn keep_for_postpones_the_abort() {
        let gate = gate();
        gate.set_effect(|| {
            Some(Box::new(|retain: &mut Retain| {
                retain.keep_for(Duration::from_millis(50))
            }))
        });
        gate.on_mount();
        gate.on_unmount().unwrap();

        time::advance(Duration::from_millis(49)).await;
        settle().await;
        assert!(!gate.token().is_cancelled());

        time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert!(gate.token().is_cancelled());
    }

    #[tokio::test]
    async fn keep_until_waits_for_the_future() {
        let gate = gate();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let rx = Arc::new(Mutex::new(Some(rx)));
        gate.set_effect(move || {
            let rx = rx.lock().take()?;
            Some(Box::new(move |retain: &mut Retain| retain.keep_until(rx)))
        });
        gate.on_mount();
        gate.on_unmount().unwrap();

        settle().await;
        assert!(!gate.token().is_cancelled());

        tx.send(()).unwrap();
        settle().await;
        assert!(gate.token().is_cancelled());
    }

    #[tokio::test]
    async fn effect_runs_per_mount_and_cleanup_per_unmount() {
        let gate = gate();
        let mounts = Arc::new(AtomicUsize::new(0));
        let cleanups = Arc::new(AtomicUsize::new(0));
        {
            let mounts = Arc::clone(&mounts);
            let cleanups = Arc::clone(&cleanups);
            gate.set_effect(move || {
                mounts.fetch_add(1, Ordering::SeqCst);
                let cleanups = Arc::clone(&cleanups);
                Some(Box::new(move |retain: &mut Retain| {
                    cleanups.fetch_add(1, Ordering::SeqCst);
                    retain.keep()
                }))
            });
        }

        gate.on_mount();
        gate.on_unmount().unwrap();
        gate.on_mount();
        gate.on_unmount().unwrap();

        assert_eq!(mounts.load(Ordering::SeqCst), 2);
        assert_eq!(cleanups.load(Ordering::SeqCst), 2);
        settle().await;
        assert!(!gate.token().is_cancelled());
    }

    #[tokio::test]
    async fn mounted_future_resolves_after_mount() {
        let gate = gate();
        let mounted = gate.mounted();
        gate.on_mount();
        assert!(!gate.is_mounted());
        mounted.await.unwrap();
        assert!(gate.is_mounted());
    }

    #[tokio::test]
    async fn mounted_future_rejects_when_aborted() {
        let gate = gate();
        let mounted = gate.mounted();
        gate.on_unmount().unwrap();
        assert!(mounted.await.unwrap_err().is_abort());
    }

    #[tokio::test]
    async fn lifecycle_events_are_published() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let gate = LifecycleGate::with_bus(GateConfig::default(), bus);

        gate.on_mount();
        settle().await;
        gate.on_unmount().unwrap();
        settle().await;

        let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|ev| ev.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Mounted,
                EventKind::AbortScheduled,
                EventKind::Unmounted,
                EventKind::AbortFired,
            ]
        );
    }
}
