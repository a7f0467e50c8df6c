//! # Emission payloads.
//!
//! A plain value resolves the pending future and is discarded if nobody awaits it.
//! The wrappers change that:
//!
//! | wrapper          | retention    | effect                                                   |
//! |------------------|--------------|----------------------------------------------------------|
//! | (plain value)    | `Transient`  | resolve; unclaimed values are dropped (diagnostic)       |
//! | [`preserving`]   | `Persistent` | resolve and keep the value for the next await, always    |
//! | [`important`]    | `Important`  | keep the value for the next await only if nobody awaited |
//! | [`throwing`]     | `Transient`  | reject instead of resolving                              |

use crate::error::EventError;

/// What happens to a fulfilled value nobody has picked up yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Retention {
    /// Discarded once delivered (or immediately, if nobody awaited).
    #[default]
    Transient,
    /// Kept for the next await regardless of whether someone was waiting.
    Persistent,
    /// Kept for the next await only if nobody was waiting.
    Important,
}

/// A value (or failure) handed to a trigger.
#[derive(Debug)]
pub enum Payload<T> {
    Plain(T),
    Preserving(T),
    Important(T),
    Throwing(EventError),
}

impl<T> Payload<T> {
    pub(crate) fn into_parts(self) -> (Result<T, EventError>, Retention) {
        match self {
            Payload::Plain(v) => (Ok(v), Retention::Transient),
            Payload::Preserving(v) => (Ok(v), Retention::Persistent),
            Payload::Important(v) => (Ok(v), Retention::Important),
            Payload::Throwing(e) => (Err(e), Retention::Transient),
        }
    }
}

impl<T> From<T> for Payload<T> {
    fn from(value: T) -> Self {
        Payload::Plain(value)
    }
}

/// Keeps the value available for the next await even if nobody is waiting now.
pub fn preserving<T>(value: T) -> Payload<T> {
    Payload::Preserving(value)
}

/// Keeps the value for the next await only when nobody is waiting now.
pub fn important<T>(value: T) -> Payload<T> {
    Payload::Important(value)
}

/// Rejects the pending future instead of resolving it.
///
/// # Example
/// ```
/// use seqflow::{ErrorRecord, Payload, throwing};
///
/// let from_message: Payload<u32> = throwing("disk full");
/// let from_record: Payload<u32> = throwing(ErrorRecord::new("quota exceeded"));
/// let from_error: Payload<u32> = throwing(anyhow::anyhow!("io"));
/// # let _ = (from_message, from_record, from_error);
/// ```
pub fn throwing<T>(thrown: impl Into<Thrown>) -> Payload<T> {
    Payload::Throwing(thrown.into().into_error())
}

/// Structured failure record, `{ type: "error", error }`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorRecord {
    pub error: String,
}

impl ErrorRecord {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Anything a `throwing` payload accepts.
///
/// Errors are used as they are; messages and records are turned into one.
#[derive(Debug)]
pub enum Thrown {
    Error(anyhow::Error),
    Message(String),
    Record(ErrorRecord),
}

impl Thrown {
    fn into_error(self) -> EventError {
        match self {
            Thrown::Error(e) => EventError::failed(e),
            Thrown::Message(msg) => EventError::failed(anyhow::Error::msg(msg)),
            Thrown::Record(rec) => EventError::failed(anyhow::Error::msg(rec.error)),
        }
    }
}

impl From<anyhow::Error> for Thrown {
    fn from(e: anyhow::Error) -> Self {
        Thrown::Error(e)
    }
}

impl From<String> for Thrown {
    fn from(msg: String) -> Self {
        Thrown::Message(msg)
    }
}

impl From<&str> for Thrown {
    fn from(msg: &str) -> Self {
        Thrown::Message(msg.to_string())
    }
}

impl From<ErrorRecord> for Thrown {
    fn from(rec: ErrorRecord) -> Self {
        Thrown::Record(rec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_values_are_transient() {
        let (res, retention) = Payload::from(3).into_parts();
        assert_eq!(res.unwrap(), 3);
        assert_eq!(retention, Retention::Transient);
    }

    #[test]
    fn wrappers_select_retention() {
        assert_eq!(preserving(1).into_parts().1, Retention::Persistent);
        assert_eq!(important(1).into_parts().1, Retention::Important);
    }

    #[test]
    fn throwing_synthesizes_errors_from_messages_and_records() {
        let (res, _) = throwing::<u8>("disk full").into_parts();
        assert_eq!(res.unwrap_err().to_string(), "disk full");

        let (res, _) = throwing::<u8>(ErrorRecord::new("quota")).into_parts();
        assert_eq!(res.unwrap_err().to_string(), "quota");
    }

    #[test]
    fn throwing_keeps_existing_errors() {
        #[derive(Debug, thiserror::Error)]
        #[error("custom")]
        struct Custom;

        let (res, _) = throwing::<u8>(anyhow::Error::new(Custom)).into_parts();
        match res.unwrap_err() {
            EventError::Failed(inner) => assert!(inner.downcast_ref::<Custom>().is_some()),
            other => panic!("unexpected {other:?}"),
        }
    }
}
