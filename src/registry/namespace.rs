//! # Occurrence namespace.
//!
//! [`Registry`] maps occurrence names to slots. A slot is created lazily by the
//! first `eventual(name)` or the first emit for `name`.
//!
//! ## Slot states
//! ```text
//!                 eventual()                      emit(plain)
//!   (empty) ─────────────────► pending ─────────────────────────► (empty)
//!      │                          │  emit(preserving)
//!      │ emit(preserving |        └────────────────────────────► retained
//!      │      important)                                            │
//!      └──────────────────────────────────────────────────────► retained
//!                                                                   │ eventual()
//!                                                                   ▼
//!                                                   (empty; the settled future is handed out once)
//! ```
//!
//! ## Rules
//! - A slot holds at most one resolver.
//! - A slot left with neither a resolver nor a retained value is removed.
//! - Before settling, every `eventual(name)` returns the same future.
//! - When the cancellation token fires, every pending future rejects with
//!   [`EventError::Abort`]; the slots are drained the next time the registry is touched.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::core::abortable;
use crate::error::{EventError, UsageError};
use crate::events::{Bus, Event, EventKind};
use crate::registry::Value;
use crate::registry::eventual::Eventual;
use crate::registry::payload::{Payload, Retention};
use crate::registry::trigger::Trigger;

/// Registry settings.
#[derive(Clone, Copy, Debug, Default)]
pub struct RegistryConfig {
    /// Publish [`EventKind::TriggerUnclaimed`] when an emit finds nobody awaiting.
    pub warning: bool,
}

struct Slot<T: Value> {
    current: Option<Eventual<T>>,
    resolver: Option<oneshot::Sender<Result<T, EventError>>>,
    retention: Retention,
}

impl<T: Value> Default for Slot<T> {
    fn default() -> Self {
        Self {
            current: None,
            resolver: None,
            retention: Retention::Transient,
        }
    }
}

pub(crate) struct Inner<T: Value> {
    slots: Mutex<HashMap<Arc<str>, Slot<T>>>,
    triggers: Mutex<HashMap<Arc<str>, Trigger<T>>>,
    config: RegistryConfig,
    token: CancellationToken,
    bus: Bus,
    aborted: AtomicBool,
}

impl<T: Value> Inner<T> {
    /// Settles the slot for `name` according to the payload.
    pub(crate) fn fulfill(self: &Arc<Self>, name: &Arc<str>, payload: Payload<T>) {
        let (outcome, retention) = payload.into_parts();
        let mut slots = self.slots.lock();
        if self.drain_if_aborted(&mut slots) {
            return;
        }

        let slot = slots.entry(Arc::clone(name)).or_default();
        match slot.resolver.take() {
            Some(tx) => {
                if let Some(current) = &slot.current {
                    current.stamp().mark();
                }
                let _ = tx.send(outcome);
                if retention == Retention::Persistent {
                    slot.retention = Retention::Persistent;
                } else {
                    slot.current = None;
                    slot.retention = Retention::Transient;
                }
            }
            None => match retention {
                Retention::Persistent | Retention::Important => {
                    slot.current = Some(Eventual::settled(
                        Arc::clone(name),
                        outcome,
                        Arc::downgrade(self),
                    ));
                    slot.retention = retention;
                }
                Retention::Transient => {
                    slot.current = None;
                    slot.retention = Retention::Transient;
                    if self.config.warning {
                        self.bus.publish(
                            Event::new(EventKind::TriggerUnclaimed)
                                .with_name(Arc::clone(name))
                                .with_reason("nobody awaiting"),
                        );
                    }
                }
            },
        }
        if slot.current.is_none() && slot.resolver.is_none() {
            slots.remove(name);
        }
    }

    fn eventual(self: &Arc<Self>, name: &str) -> Eventual<T> {
        let mut slots = self.slots.lock();
        if self.drain_if_aborted(&mut slots) {
            return Eventual::settled(
                Arc::from(name),
                Err(EventError::Abort),
                Arc::downgrade(self),
            );
        }

        if let Some(slot) = slots.get_mut(name) {
            if let Some(current) = slot.current.clone() {
                if slot.resolver.is_none() {
                    // retained value: handed out once
                    slots.remove(name);
                }
                return current;
            }
            return self.arm(Arc::from(name), slot);
        }

        let key: Arc<str> = Arc::from(name);
        let slot = slots.entry(Arc::clone(&key)).or_default();
        self.arm(key, slot)
    }

    fn arm(self: &Arc<Self>, name: Arc<str>, slot: &mut Slot<T>) -> Eventual<T> {
        let (tx, rx) = oneshot::channel();
        let fut = abortable(self.token.clone(), async move {
            rx.await.unwrap_or(Err(EventError::Abort))
        });
        let eventual = Eventual::new(name, fut, Arc::downgrade(self));
        slot.resolver = Some(tx);
        slot.current = Some(eventual.clone());
        eventual
    }

    /// Rejects every pending resolver once the token has fired.
    ///
    /// Returns true when the registry is aborted.
    fn drain_if_aborted(&self, slots: &mut HashMap<Arc<str>, Slot<T>>) -> bool {
        if !self.token.is_cancelled() {
            return false;
        }
        if !self.aborted.swap(true, Ordering::AcqRel) {
            let mut pending = 0usize;
            for slot in slots.values_mut() {
                if let Some(tx) = slot.resolver.take() {
                    let _ = tx.send(Err(EventError::Abort));
                    pending += 1;
                }
                slot.current = None;
            }
            slots.clear();
            self.bus.publish(
                Event::new(EventKind::RegistryAborted).with_reason(pending.to_string()),
            );
        }
        true
    }
}

/// Dynamic namespace of occurrences.
///
/// Producers obtain a [`Trigger`] with [`on`](Self::on) and emit through it;
/// consumers obtain an [`Eventual`] with [`eventual`](Self::eventual) and await it.
/// `Registry` is a cheap handle: clones share the same namespace.
///
/// # Example
/// ```
/// use seqflow::{Registry, RegistryConfig};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let registry = Registry::<u32>::new(RegistryConfig::default(), CancellationToken::new());
/// let click = registry.eventual("click");
/// registry.on("click").emit(6);
/// assert_eq!(click.await.unwrap(), 6);
/// # }
/// ```
pub struct Registry<T: Value> {
    inner: Arc<Inner<T>>,
}

impl<T: Value> Registry<T> {
    /// Creates a registry observing `token`, with a private diagnostics bus.
    pub fn new(config: RegistryConfig, token: CancellationToken) -> Self {
        Self::with_bus(config, token, Bus::default())
    }

    /// Creates a registry publishing diagnostics on `bus`.
    pub fn with_bus(config: RegistryConfig, token: CancellationToken, bus: Bus) -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(HashMap::new()),
                triggers: Mutex::new(HashMap::new()),
                config,
                token,
                bus,
                aborted: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the (cached) trigger for `name`.
    pub fn on(&self, name: &str) -> Trigger<T> {
        let mut triggers = self.inner.triggers.lock();
        if let Some(trigger) = triggers.get(name) {
            return trigger.clone();
        }
        let key: Arc<str> = Arc::from(name);
        let trigger = Trigger::new(Arc::clone(&key), Arc::downgrade(&self.inner));
        triggers.insert(key, trigger.clone());
        trigger
    }

    /// Returns the future for `name`, creating it if needed.
    pub fn eventual(&self, name: &str) -> Eventual<T> {
        self.inner.eventual(name)
    }

    /// Names an external future so it can join a chain.
    ///
    /// The future is raced against the cancellation token; its error, if any,
    /// becomes [`EventError::Failed`].
    pub fn external<F, E>(&self, name: &str, fut: F) -> Result<Eventual<T>, UsageError>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<anyhow::Error>,
    {
        if name.is_empty() {
            return Err(UsageError::MissingName);
        }
        let fut = abortable(self.inner.token.clone(), async move {
            fut.await.map_err(EventError::failed)
        });
        Ok(Eventual::new(
            Arc::from(name),
            fut,
            Arc::downgrade(&self.inner),
        ))
    }

    /// True while a future for `name` is pending.
    pub fn is_awaiting(&self, name: &str) -> bool {
        let mut slots = self.inner.slots.lock();
        if self.inner.drain_if_aborted(&mut slots) {
            return false;
        }
        slots.get(name).is_some_and(|slot| slot.resolver.is_some())
    }

    /// Returns the sorted names that are pending or hold a retained value.
    pub fn names(&self) -> Vec<String> {
        let mut slots = self.inner.slots.lock();
        if self.inner.drain_if_aborted(&mut slots) {
            return Vec::new();
        }
        let mut names: Vec<String> = slots.keys().map(|k| k.to_string()).collect();
        names.sort_unstable();
        names
    }

    /// The cancellation token this registry observes.
    pub fn token(&self) -> &CancellationToken {
        &self.inner.token
    }

    pub(crate) fn eventual_in(registry: &Weak<Inner<T>>, name: &str) -> Eventual<T> {
        match registry.upgrade() {
            Some(inner) => inner.eventual(name),
            None => Eventual::settled(Arc::from(name), Err(EventError::Abort), Weak::new()),
        }
    }
}

impl<T: Value> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Value> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.inner.config)
            .field("aborted", &self.inner.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{important, preserving, throwing};
    use futures::FutureExt;
    use std::future::IntoFuture;

    fn registry() -> (Registry<u32>, CancellationToken) {
        let token = CancellationToken::new();
        (
            Registry::new(RegistryConfig::default(), token.clone()),
            token,
        )
    }

    #[tokio::test]
    async fn same_future_until_settled_then_fresh() {
        let (reg, _token) = registry();
        let a = reg.eventual("n");
        let b = reg.eventual("n");
        assert!(a.ptr_eq(&b));

        reg.on("n").emit(1);
        assert_eq!(a.await.unwrap(), 1);
        assert_eq!(b.await.unwrap(), 1);

        let c = reg.eventual("n");
        let d = reg.eventual("n");
        assert!(c.ptr_eq(&d));
        assert!(reg.is_awaiting("n"));
    }

    #[tokio::test]
    async fn fresh_future_after_emit_is_a_different_object() {
        let (reg, _token) = registry();
        let before = reg.eventual("n");
        reg.on("n").emit(1);
        let after = reg.eventual("n");
        assert!(!before.ptr_eq(&after));
        assert!(after.into_future().now_or_never().is_none());
    }

    #[tokio::test]
    async fn unclaimed_plain_value_is_dropped_and_reported() {
        let token = CancellationToken::new();
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let reg = Registry::<u32>::with_bus(RegistryConfig { warning: true }, token, bus);

        reg.on("n").emit(5);
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::TriggerUnclaimed);
        assert_eq!(ev.name.as_deref(), Some("n"));

        assert!(reg.eventual("n").into_future().now_or_never().is_none());
    }

    #[tokio::test]
    async fn important_value_is_kept_for_one_await() {
        let (reg, _token) = registry();
        reg.on("n").emit(important(9));

        assert_eq!(reg.eventual("n").await.unwrap(), 9);
        assert!(reg.eventual("n").into_future().now_or_never().is_none());
    }

    #[tokio::test]
    async fn important_value_is_not_kept_when_someone_awaited() {
        let (reg, _token) = registry();
        let waiting = reg.eventual("n");
        reg.on("n").emit(important(9));

        assert_eq!(waiting.await.unwrap(), 9);
        assert!(reg.eventual("n").into_future().now_or_never().is_none());
    }

    #[tokio::test]
    async fn preserved_value_outlives_the_current_awaiter() {
        let (reg, _token) = registry();
        let waiting = reg.eventual("n");
        reg.on("n").emit(preserving(4));

        assert_eq!(waiting.await.unwrap(), 4);
        let next = reg.eventual("n");
        assert_eq!(next.await.unwrap(), 4);
        // picked up: back to transient
        assert!(reg.eventual("n").into_future().now_or_never().is_none());
    }

    #[tokio::test]
    async fn throwing_rejects_the_awaiter() {
        let (reg, _token) = registry();
        let waiting = reg.eventual("n");
        reg.on("n").emit(throwing("nope"));

        let err = waiting.await.unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }

    #[tokio::test]
    async fn cancellation_rejects_every_pending_future_once() {
        let token = CancellationToken::new();
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let reg = Registry::<u32>::with_bus(RegistryConfig::default(), token.clone(), bus);

        let a = reg.eventual("a");
        let b = reg.eventual("b");
        token.cancel();
        token.cancel();

        assert!(a.await.unwrap_err().is_abort());
        assert!(b.await.unwrap_err().is_abort());

        // touching the registry drains it and reports once
        assert!(!reg.is_awaiting("a"));
        assert!(reg.eventual("c").await.unwrap_err().is_abort());
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::RegistryAborted);
        assert_eq!(ev.reason.as_deref(), Some("2"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn external_future_needs_a_name() {
        let (reg, _token) = registry();
        let err = reg
            .external("", async { Ok::<u32, anyhow::Error>(1) })
            .unwrap_err();
        assert_eq!(err, UsageError::MissingName);

        let ext = reg
            .external("fetch", async { Ok::<u32, anyhow::Error>(1) })
            .unwrap();
        assert_eq!(ext.name(), "fetch");
        assert_eq!(ext.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn external_future_rejects_on_cancellation() {
        let (reg, token) = registry();
        let ext = reg
            .external("slow", futures::future::pending::<Result<u32, anyhow::Error>>())
            .unwrap();
        token.cancel();
        assert!(ext.await.unwrap_err().is_abort());
    }

    #[tokio::test]
    async fn unclaimed_and_settled_names_leave_no_slot_behind() {
        let (reg, _token) = registry();
        for i in 0..1_000 {
            reg.on(&format!("n{i}")).emit(1);
        }
        assert!(reg.names().is_empty());

        let waiting = reg.eventual("w");
        assert_eq!(reg.names(), vec!["w".to_string()]);
        reg.on("w").emit(2);
        assert_eq!(waiting.await.unwrap(), 2);
        assert!(reg.names().is_empty());

        reg.on("kept").emit(important(3));
        assert_eq!(reg.names(), vec!["kept".to_string()]);
        assert_eq!(reg.eventual("kept").await.unwrap(), 3);
        assert!(reg.names().is_empty());
    }

    #[tokio::test]
    async fn names_are_drained_after_cancellation() {
        let (reg, token) = registry();
        let _a = reg.eventual("a");
        reg.on("b").emit(preserving(1));
        assert_eq!(reg.names().len(), 2);

        token.cancel();
        assert!(reg.names().is_empty());
        assert!(!reg.is_awaiting("a"));
    }

    #[test]
    fn names_are_sorted() {
        let (reg, _token) = registry();
        let _ = reg.eventual("b");
        let _ = reg.eventual("a");
        assert_eq!(reg.names(), vec!["a".to_string(), "b".to_string()]);
    }
}
