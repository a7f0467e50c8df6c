//! # Triggers and stable handlers.
//!
//! A [`Trigger`] emits into one occurrence. Besides [`Trigger::emit`] it hands out
//! [`Handler`]s: callables bound to a fixed value ([`Trigger::bind`]) or to a
//! transform ([`Trigger::filter`]). Asking twice for the same binding returns the
//! same handler, so callers can compare handlers by identity.
//!
//! Bindings live in a per-trigger LRU of [`HANDLER_CACHE_CAP`] entries; the
//! least recently requested binding is evicted first.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};

use lru::LruCache;
use parking_lot::Mutex;

use crate::registry::Value;
use crate::registry::namespace::Inner;
use crate::registry::payload::Payload;

/// Maximum number of cached bindings per occurrence name.
pub const HANDLER_CACHE_CAP: usize = 128;

/// A cloneable callable bound to an occurrence.
pub struct Handler<I = ()> {
    f: Arc<dyn Fn(I) + Send + Sync>,
}

impl<I> Handler<I> {
    pub(crate) fn new(f: impl Fn(I) + Send + Sync + 'static) -> Self {
        Self { f: Arc::new(f) }
    }

    /// Invokes the handler.
    pub fn call(&self, input: I) {
        (self.f)(input)
    }

    /// True when both handles share the same underlying callable.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.f, &other.f)
    }
}

impl<I> Clone for Handler<I> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<I> fmt::Debug for Handler<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").finish_non_exhaustive()
    }
}

/// Cache key: a bound value or a transform function.
#[derive(Clone)]
enum BindingKey {
    Value {
        hash: u64,
        value: Arc<dyn Any + Send + Sync>,
        same: fn(&dyn Any, &dyn Any) -> bool,
    },
    Filter {
        input: TypeId,
        addr: usize,
    },
}

impl BindingKey {
    fn value<T: Value + Hash + Eq>(value: &T) -> Self {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        BindingKey::Value {
            hash: hasher.finish(),
            value: Arc::new(value.clone()),
            same: same_value::<T>,
        }
    }
}

fn same_value<T: PartialEq + 'static>(a: &dyn Any, b: &dyn Any) -> bool {
    match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

impl PartialEq for BindingKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                BindingKey::Value {
                    hash: ha,
                    value: va,
                    same,
                },
                BindingKey::Value {
                    hash: hb,
                    value: vb,
                    ..
                },
            ) => {
                let a: &dyn Any = &**va;
                let b: &dyn Any = &**vb;
                ha == hb && same(a, b)
            }
            (
                BindingKey::Filter { input: ia, addr: aa },
                BindingKey::Filter { input: ib, addr: ab },
            ) => ia == ib && aa == ab,
            _ => false,
        }
    }
}

impl Eq for BindingKey {}

impl Hash for BindingKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            BindingKey::Value { hash, .. } => {
                0u8.hash(state);
                hash.hash(state);
            }
            BindingKey::Filter { input, addr } => {
                1u8.hash(state);
                input.hash(state);
                addr.hash(state);
            }
        }
    }
}

struct TriggerInner<T: Value> {
    name: Arc<str>,
    registry: Weak<Inner<T>>,
    handlers: Mutex<LruCache<BindingKey, Arc<dyn Any + Send + Sync>>>,
}

/// Emitter for one occurrence; obtained with [`Registry::on`](crate::Registry::on).
pub struct Trigger<T: Value> {
    shared: Arc<TriggerInner<T>>,
}

impl<T: Value> Trigger<T> {
    pub(crate) fn new(name: Arc<str>, registry: Weak<Inner<T>>) -> Self {
        let cap = NonZeroUsize::new(HANDLER_CACHE_CAP).unwrap_or(NonZeroUsize::MIN);
        Self {
            shared: Arc::new(TriggerInner {
                name,
                registry,
                handlers: Mutex::new(LruCache::new(cap)),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Settles the occurrence. Accepts a plain value or a
    /// [`preserving`](crate::preserving) / [`important`](crate::important) /
    /// [`throwing`](crate::throwing) payload.
    ///
    /// Emitting after the registry is gone is a no-op.
    pub fn emit(&self, payload: impl Into<Payload<T>>) {
        emit_into(&self.shared.registry, &self.shared.name, payload.into());
    }

    /// Handler emitting its input as a plain value.
    pub fn handler(&self) -> Handler<T> {
        let registry = Weak::clone(&self.shared.registry);
        let name = Arc::clone(&self.shared.name);
        Handler::new(move |value: T| emit_into(&registry, &name, Payload::Plain(value)))
    }

    /// Handler that always emits `value`.
    ///
    /// Repeated calls with an equal value return the same handler while the
    /// binding stays in the cache.
    pub fn bind(&self, value: T) -> Handler<()>
    where
        T: Hash + Eq,
    {
        let key = BindingKey::value(&value);
        self.cached(key, || {
            let registry = Weak::clone(&self.shared.registry);
            let name = Arc::clone(&self.shared.name);
            Handler::new(move |()| emit_into(&registry, &name, Payload::Plain(value.clone())))
        })
    }

    /// Handler passing its input through `f`; `None` suppresses the emit.
    ///
    /// Cached by function address.
    pub fn filter<I: 'static>(&self, f: fn(I) -> Option<T>) -> Handler<I> {
        let key = BindingKey::Filter {
            input: TypeId::of::<I>(),
            addr: f as usize,
        };
        self.cached(key, || {
            let registry = Weak::clone(&self.shared.registry);
            let name = Arc::clone(&self.shared.name);
            Handler::new(move |input: I| {
                if let Some(value) = f(input) {
                    emit_into(&registry, &name, Payload::Plain(value));
                }
            })
        })
    }

    /// Number of cached bindings.
    pub fn cached_bindings(&self) -> usize {
        self.shared.handlers.lock().len()
    }

    /// True when both handles refer to the same trigger.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    fn cached<I: 'static>(&self, key: BindingKey, make: impl FnOnce() -> Handler<I>) -> Handler<I> {
        let mut handlers = self.shared.handlers.lock();
        if let Some(handler) = handlers
            .get(&key)
            .and_then(|h| h.downcast_ref::<Handler<I>>())
        {
            return handler.clone();
        }
        let handler = make();
        handlers.put(key, Arc::new(handler.clone()));
        handler
    }
}

fn emit_into<T: Value>(registry: &Weak<Inner<T>>, name: &Arc<str>, payload: Payload<T>) {
    if let Some(inner) = registry.upgrade() {
        inner.fulfill(name, payload);
    }
}

impl<T: Value> Clone for Trigger<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Value> fmt::Debug for Trigger<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("name", &self.shared.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Registry, RegistryConfig};
    use futures::FutureExt;
    use std::future::IntoFuture;
    use tokio_util::sync::CancellationToken;

    fn registry() -> Registry<u32> {
        Registry::new(RegistryConfig::default(), CancellationToken::new())
    }

    #[test]
    fn triggers_are_cached_per_name() {
        let reg = registry();
        assert!(reg.on("click").ptr_eq(&reg.on("click")));
        assert!(!reg.on("click").ptr_eq(&reg.on("hover")));
    }

    #[test]
    fn bound_handlers_are_identity_stable() {
        let reg = registry();
        let a = reg.on("click").bind(6);
        let b = reg.on("click").bind(6);
        let c = reg.on("click").bind(7);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert!(c.ptr_eq(&reg.on("click").bind(7)));
    }

    #[test]
    fn oldest_binding_is_evicted_first() {
        let reg = registry();
        let trigger = reg.on("n");
        let handlers: Vec<Handler<()>> = (1..=129).map(|v| trigger.bind(v)).collect();
        assert_eq!(trigger.cached_bindings(), HANDLER_CACHE_CAP);

        for (i, v) in (2..=129).enumerate() {
            assert!(trigger.bind(v).ptr_eq(&handlers[i + 1]), "value {v}");
        }
        assert!(!trigger.bind(1).ptr_eq(&handlers[0]));
    }

    #[tokio::test]
    async fn bound_handler_emits_its_value() {
        let reg = registry();
        let waiting = reg.eventual("click");
        reg.on("click").bind(6).call(());
        assert_eq!(waiting.await.unwrap(), 6);
    }

    fn even(v: u32) -> Option<u32> {
        (v % 2 == 0).then_some(v)
    }

    fn odd(v: u32) -> Option<u32> {
        (v % 2 == 1).then_some(v)
    }

    #[tokio::test]
    async fn filter_suppresses_none() {
        let reg = registry();
        let handler = reg.on("n").filter(even);
        assert!(handler.ptr_eq(&reg.on("n").filter(even)));
        assert!(!handler.ptr_eq(&reg.on("n").filter(odd)));

        let waiting = reg.eventual("n");
        handler.call(3);
        assert!(waiting.clone().into_future().now_or_never().is_none());
        handler.call(4);
        assert_eq!(waiting.await.unwrap(), 4);
    }

    #[tokio::test]
    async fn handlers_outliving_the_registry_do_nothing() {
        let reg = registry();
        let handler = reg.on("n").handler();
        drop(reg);
        handler.call(1);
    }
}
