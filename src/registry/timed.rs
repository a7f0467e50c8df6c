//! # Timeout attachment.
//!
//! `eventual.within(20).milliseconds()` turns an [`Eventual`](crate::Eventual) or
//! a [`Chain`](crate::Chain) into a [`Timed`] future that settles with
//! [`Within::TimedOut`] when the deadline passes first.
//!
//! ```text
//!  within(n) ──► TimeoutBuilder ──unit──► Result<Timed, UsageError> ──await──► Within
//! ```
//!
//! - The deadline is fixed when the unit is picked.
//! - The timer is dropped as soon as the inner future settles.
//! - `f64::INFINITY` attaches no timer at all.
//! - A builder without a unit is not a future, and a `Timed` has no `within`.

use std::future::IntoFuture;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::time::{self, Instant};

use crate::error::UsageError;
use crate::time::TimeUnit;

/// Pending timeout: pick a unit to finish it.
#[derive(Debug)]
#[must_use = "a timeout does nothing until a unit is picked"]
pub struct TimeoutBuilder<F> {
    inner: F,
    amount: f64,
}

impl<F> TimeoutBuilder<F> {
    pub(crate) fn new(inner: F, amount: impl Into<f64>) -> Self {
        Self {
            inner,
            amount: amount.into(),
        }
    }

    pub fn milliseconds(self) -> Result<Timed<F>, UsageError> {
        self.in_unit(TimeUnit::Milliseconds)
    }

    pub fn seconds(self) -> Result<Timed<F>, UsageError> {
        self.in_unit(TimeUnit::Seconds)
    }

    pub fn minutes(self) -> Result<Timed<F>, UsageError> {
        self.in_unit(TimeUnit::Minutes)
    }

    pub fn hours(self) -> Result<Timed<F>, UsageError> {
        self.in_unit(TimeUnit::Hours)
    }

    /// Picks a unit by name (`"seconds"`, `"second"`, ...).
    pub fn unit(self, name: &str) -> Result<Timed<F>, UsageError> {
        let unit = name.parse()?;
        self.in_unit(unit)
    }

    pub fn in_unit(self, unit: TimeUnit) -> Result<Timed<F>, UsageError> {
        let limit = unit.to_duration(self.amount)?;
        Ok(Timed {
            inner: self.inner,
            deadline: limit.map(deadline_after),
            amount: self.amount,
            unit,
        })
    }
}

fn deadline_after(d: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(d).unwrap_or(now + Duration::from_secs(86_400 * 365 * 30))
}

/// A future raced against a deadline.
#[derive(Debug)]
pub struct Timed<F> {
    inner: F,
    deadline: Option<Instant>,
    amount: f64,
    unit: TimeUnit,
}

impl<F> Timed<F> {
    /// Remaining time before the deadline; `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

/// Outcome of a [`Timed`] future.
#[derive(Clone, Debug, PartialEq)]
pub enum Within<R> {
    /// The inner future settled first; its own result.
    Settled(R),
    /// The deadline passed first.
    TimedOut { amount: f64, unit: TimeUnit },
}

impl<R> Within<R> {
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Within::TimedOut { .. })
    }

    pub fn settled(self) -> Option<R> {
        match self {
            Within::Settled(r) => Some(r),
            Within::TimedOut { .. } => None,
        }
    }
}

impl<F> IntoFuture for Timed<F>
where
    F: IntoFuture,
    F::IntoFuture: Send + 'static,
    F::Output: Send + 'static,
{
    type Output = Within<F::Output>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let fut = self.inner.into_future();
        let Some(deadline) = self.deadline else {
            return fut.map(Within::Settled).boxed();
        };
        let (amount, unit) = (self.amount, self.unit);
        async move {
            match time::timeout_at(deadline, fut).await {
                Ok(res) => Within::Settled(res),
                Err(_) => Within::TimedOut { amount, unit },
            }
        }
        .boxed()
    }
}
