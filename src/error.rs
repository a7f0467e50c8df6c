//! Error types used by the registry, the scheduler and the lifecycle gate.
//!
//! This module defines three enums:
//!
//! - [`EventError`] — rejections delivered to registry awaiters.
//! - [`ScheduleError`] — outcomes of a [`Scheduler`](crate::Scheduler) wait that are not a value.
//! - [`UsageError`] — programmer errors, returned synchronously at the call site.
//!
//! All of them provide `as_label` / `as_message` helpers for logs and diagnostics.
//! Application errors are carried as `Arc<anyhow::Error>` so a shared future can hand
//! the same failure to every awaiter.

use std::sync::Arc;

use thiserror::Error;

/// # Rejections observed by registry awaiters.
///
/// `Abort` is expected: it is what every pending future receives when the owning
/// cancellation token fires, and the boundary that owns the token is the place to
/// swallow it.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum EventError {
    /// The cancellation token fired before the occurrence settled.
    #[error("aborted")]
    Abort,

    /// A `throwing` payload or a failed external future.
    #[error("{0}")]
    Failed(Arc<anyhow::Error>),
}

impl EventError {
    /// Wraps an application error.
    pub fn failed(err: impl Into<anyhow::Error>) -> Self {
        EventError::Failed(Arc::new(err.into()))
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use seqflow::EventError;
    ///
    /// assert_eq!(EventError::Abort.as_label(), "event_abort");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            EventError::Abort => "event_abort",
            EventError::Failed(_) => "event_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            EventError::Abort => "cancellation fired".to_string(),
            EventError::Failed(err) => format!("error: {err}"),
        }
    }

    /// True for the cancellation rejection.
    pub fn is_abort(&self) -> bool {
        matches!(self, EventError::Abort)
    }
}

/// # Outcomes of a scheduler wait other than a value.
///
/// `Interrupted` and `TimedOut` are scheduling signals, not failures; they are only
/// exchanged between the [`Scheduler`](crate::Scheduler) and its driver.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ScheduleError {
    /// The release period elapsed (or a flush was requested); re-evaluate.
    #[error("interrupted")]
    Interrupted,

    /// No value arrived before the first-value ceiling.
    #[error("no value produced in time")]
    TimedOut,

    /// The owning cancellation token fired or the wait was aborted explicitly.
    #[error("aborted")]
    Aborted,

    /// The source failed; the session will not pull again.
    #[error("source failed: {0}")]
    Failed(Arc<anyhow::Error>),
}

impl ScheduleError {
    /// Wraps an application error raised by the source.
    pub fn failed(err: impl Into<anyhow::Error>) -> Self {
        ScheduleError::Failed(Arc::new(err.into()))
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use seqflow::ScheduleError;
    ///
    /// assert_eq!(ScheduleError::TimedOut.as_label(), "schedule_timed_out");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ScheduleError::Interrupted => "schedule_interrupted",
            ScheduleError::TimedOut => "schedule_timed_out",
            ScheduleError::Aborted => "schedule_aborted",
            ScheduleError::Failed(_) => "schedule_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ScheduleError::Interrupted => "period elapsed".to_string(),
            ScheduleError::TimedOut => "first value ceiling exceeded".to_string(),
            ScheduleError::Aborted => "wait aborted".to_string(),
            ScheduleError::Failed(err) => format!("error: {err}"),
        }
    }

    /// True for `Interrupted` and `TimedOut`, the two internal scheduling signals.
    ///
    /// # Example
    /// ```
    /// use seqflow::ScheduleError;
    ///
    /// assert!(ScheduleError::Interrupted.is_scheduling());
    /// assert!(!ScheduleError::Aborted.is_scheduling());
    /// ```
    pub fn is_scheduling(&self) -> bool {
        matches!(self, ScheduleError::Interrupted | ScheduleError::TimedOut)
    }

    /// True for the cancellation outcome.
    pub fn is_abort(&self) -> bool {
        matches!(self, ScheduleError::Aborted)
    }

    /// Precedence used when several signals are pending at once.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            ScheduleError::Interrupted => 0,
            ScheduleError::TimedOut => 1,
            ScheduleError::Failed(_) => 2,
            ScheduleError::Aborted => 3,
        }
    }
}

impl From<EventError> for ScheduleError {
    fn from(err: EventError) -> Self {
        match err {
            EventError::Abort => ScheduleError::Aborted,
            EventError::Failed(e) => ScheduleError::Failed(e),
        }
    }
}

/// # Programmer errors.
///
/// Returned synchronously from the call that misused the API, never through a
/// future, so they surface at the call site.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// An external future was merged without a name.
    #[error("external future needs a name")]
    MissingName,

    /// A timeout unit name that is not milliseconds/seconds/minutes/hours.
    #[error("unknown time unit: {unit}")]
    UnknownUnit {
        /// The rejected unit name.
        unit: String,
    },

    /// A timeout amount that is negative or not a number.
    #[error("invalid duration: {amount}")]
    InvalidDuration {
        /// The rejected amount, formatted.
        amount: String,
    },

    /// More than one of `keep`/`keep_for`/`keep_until` in a single cleanup.
    #[error("keep(), keep_for() and keep_until() are mutually exclusive")]
    DuplicateKeep,
}

impl UsageError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            UsageError::MissingName => "usage_missing_name",
            UsageError::UnknownUnit { .. } => "usage_unknown_unit",
            UsageError::InvalidDuration { .. } => "usage_invalid_duration",
            UsageError::DuplicateKeep => "usage_duplicate_keep",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}
