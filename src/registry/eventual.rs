//! # Named shared futures.
//!
//! An [`Eventual`] is the future handed out for one occurrence (or for a named
//! external future). Clones share one underlying future, so every awaiter sees
//! the same value or the same error.
//!
//! Each eventual also carries a settle stamp taken from a global counter at the
//! moment its occurrence is emitted, so chains can order branches by when they
//! actually settled rather than by when they were polled.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use crate::error::EventError;
use crate::registry::Value;
use crate::registry::chain::Chain;
use crate::registry::namespace::Inner;
use crate::registry::timed::TimeoutBuilder;

pub(crate) type SharedResult<T> = Shared<BoxFuture<'static, Result<T, EventError>>>;

/// Global settle counter; starts at one so a zero stamp means unsettled.
static SETTLE_SEQ: AtomicU64 = AtomicU64::new(1);

/// Settle-order stamp shared by every clone of one eventual.
#[derive(Clone, Debug, Default)]
pub(crate) struct Stamp(Arc<AtomicU64>);

impl Stamp {
    /// Records the settle order once; later calls return the first stamp.
    pub(crate) fn mark(&self) -> u64 {
        let seen = self.0.load(Ordering::Acquire);
        if seen != 0 {
            return seen;
        }
        let next = SETTLE_SEQ.fetch_add(1, Ordering::Relaxed);
        match self
            .0
            .compare_exchange(0, next, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => next,
            Err(first) => first,
        }
    }
}

/// A named, cloneable future for one occurrence.
///
/// Two calls to [`Registry::eventual`](crate::Registry::eventual) made before the
/// occurrence settles return handles to the same future ([`Eventual::ptr_eq`]).
pub struct Eventual<T: Value> {
    name: Arc<str>,
    fut: SharedResult<T>,
    stamp: Stamp,
    registry: Weak<Inner<T>>,
}

impl<T: Value> Eventual<T> {
    pub(crate) fn new<F>(name: Arc<str>, fut: F, registry: Weak<Inner<T>>) -> Self
    where
        F: Future<Output = Result<T, EventError>> + Send + 'static,
    {
        let stamp = Stamp::default();
        let marker = stamp.clone();
        let fut = async move {
            let res = fut.await;
            marker.mark();
            res
        };
        Self {
            name,
            fut: fut.boxed().shared(),
            stamp,
            registry,
        }
    }

    pub(crate) fn settled(
        name: Arc<str>,
        outcome: Result<T, EventError>,
        registry: Weak<Inner<T>>,
    ) -> Self {
        let eventual = Self::new(name, futures::future::ready(outcome), registry);
        eventual.stamp.mark();
        eventual
    }

    /// Occurrence (or external future) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub(crate) fn stamp(&self) -> &Stamp {
        &self.stamp
    }

    pub(crate) fn registry(&self) -> Weak<Inner<T>> {
        Weak::clone(&self.registry)
    }

    /// True when both handles point at the same underlying future.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.fut.ptr_eq(&other.fut)
    }

    /// Settles with the first of `self` and the occurrence `name`.
    pub fn or(self, name: &str) -> Chain<T> {
        Chain::from(self).or(name)
    }

    /// Settles once both `self` and the occurrence `name` have settled.
    pub fn and(self, name: &str) -> Chain<T> {
        Chain::from(self).and(name)
    }

    /// Like [`or`](Self::or) with an already obtained future.
    pub fn or_eventual(self, other: Eventual<T>) -> Chain<T> {
        Chain::from(self).or_eventual(other)
    }

    /// Like [`and`](Self::and) with an already obtained future.
    pub fn and_eventual(self, other: Eventual<T>) -> Chain<T> {
        Chain::from(self).and_eventual(other)
    }

    /// Starts attaching a timeout; finish it by picking a unit.
    pub fn within(self, amount: impl Into<f64>) -> TimeoutBuilder<Self> {
        TimeoutBuilder::new(self, amount)
    }
}

impl<T: Value> Clone for Eventual<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            fut: self.fut.clone(),
            stamp: self.stamp.clone(),
            registry: Weak::clone(&self.registry),
        }
    }
}

impl<T: Value> fmt::Debug for Eventual<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Eventual")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<T: Value> IntoFuture for Eventual<T> {
    type Output = Result<T, EventError>;
    type IntoFuture = SharedResult<T>;

    fn into_future(self) -> Self::IntoFuture {
        self.fut
    }
}
