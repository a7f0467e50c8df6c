//! # One logical session.
//!
//! A [`Session`] owns one [`LifecycleGate`], one [`Registry`] observing the
//! gate's token, and hands out schedulers bound to the same token. A single
//! unmount therefore unwinds everything.
//!
//! ```text
//!          SessionBuilder::build()
//!                   │
//!   ┌───────────────┼──────────────────────────────┐
//!   │  LifecycleGate ── token ──► Registry          │
//!   │        │           └──────► Scheduler (pace)  │
//!   │        └─── Bus ◄── all three publish events  │
//!   │              └──► listener ──► SubscriberSet  │
//!   └──────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust
//! use seqflow::{Config, SessionBuilder};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let session = SessionBuilder::new(Config::default()).build::<u32>();
//! session.gate().on_mount();
//!
//! let ready = session.registry().eventual("ready");
//! session.registry().on("ready").emit(1);
//! assert_eq!(ready.await.unwrap(), 1);
//!
//! session.shutdown().await;
//! # }
//! ```

use std::sync::Arc;

use futures::Stream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::Config;
use crate::events::Bus;
use crate::lifecycle::LifecycleGate;
use crate::registry::{Registry, Value};
use crate::scheduler::Scheduler;
use crate::subscribers::SubscriberSet;

/// Gate, registry and event plumbing for one logical session.
pub struct Session<T: Value> {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    listener: JoinHandle<()>,
    gate: LifecycleGate,
    registry: Registry<T>,
}

impl<T: Value> Session<T> {
    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        gate: LifecycleGate,
        registry: Registry<T>,
    ) -> Self {
        let listener = subscriber_listener(&bus, Arc::clone(&subs), gate.token());
        Self {
            cfg,
            bus,
            subs,
            listener,
            gate,
            registry,
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn gate(&self) -> &LifecycleGate {
        &self.gate
    }

    pub fn registry(&self) -> &Registry<T> {
        &self.registry
    }

    pub fn token(&self) -> CancellationToken {
        self.gate.token()
    }

    /// Wraps `source` in a scheduler paced by the session's `delay` / `limit`
    /// and aborted by the session's token.
    pub fn pace<U, S>(&self, source: S) -> Scheduler<U>
    where
        U: Send + 'static,
        S: Stream<Item = anyhow::Result<U>> + Send + 'static,
    {
        let scheduler = Scheduler::with_bus(source, self.gate.token(), self.bus.clone());
        scheduler.set_delay(self.cfg.delay, self.cfg.first_value_limit());
        scheduler
    }

    /// Cancels the session and drains the subscribers.
    pub async fn shutdown(self) {
        self.gate.token().cancel();
        let _ = self.listener.await;
        if let Ok(set) = Arc::try_unwrap(self.subs) {
            set.shutdown().await;
        }
    }
}

/// Subscribes to the bus and forwards events to the subscriber set (fire-and-forget).
///
/// Stops once the token fired and the events already queued are forwarded.
fn subscriber_listener(
    bus: &Bus,
    set: Arc<SubscriberSet>,
    token: CancellationToken,
) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                ev = rx.recv() => match ev {
                    Ok(ev) => set.emit(&ev),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                },
                _ = token.cancelled() => break,
            }
        }
        while let Ok(ev) = rx.try_recv() {
            set.emit(&ev);
        }
    })
}

impl<T: Value> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("cfg", &self.cfg)
            .field("gate", &self.gate)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
