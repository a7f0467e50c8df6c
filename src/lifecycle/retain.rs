//! # Keep-alive negotiation on unmount.
//!
//! A cleanup callback receives a [`Retain`] and may pick **one** of:
//!
//! | call              | abort                                |
//! |-------------------|--------------------------------------|
//! | (nothing)         | after the gate's debounce            |
//! | `keep()`          | never (for this unmount)             |
//! | `keep_for(d)`     | after `d`                            |
//! | `keep_until(fut)` | once `fut` settles                   |
//!
//! A second pick fails with [`UsageError::DuplicateKeep`]; the first one stays.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::UsageError;

pub(crate) enum Keep {
    Forever,
    For(Duration),
    Until(BoxFuture<'static, ()>),
}

/// Negotiation object handed to a cleanup callback.
#[derive(Default)]
pub struct Retain {
    choice: Option<Keep>,
    conflict: bool,
}

impl Retain {
    /// Cancels the pending abort entirely.
    pub fn keep(&mut self) -> Result<(), UsageError> {
        self.choose(Keep::Forever)
    }

    /// Delays the abort by `delay`.
    pub fn keep_for(&mut self, delay: Duration) -> Result<(), UsageError> {
        self.choose(Keep::For(delay))
    }

    /// Delays the abort until `fut` settles.
    pub fn keep_until<F>(&mut self, fut: F) -> Result<(), UsageError>
    where
        F: Future + Send + 'static,
    {
        self.choose(Keep::Until(fut.map(|_| ()).boxed()))
    }

    fn choose(&mut self, keep: Keep) -> Result<(), UsageError> {
        if self.choice.is_some() {
            self.conflict = true;
            return Err(UsageError::DuplicateKeep);
        }
        self.choice = Some(keep);
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (Option<Keep>, bool) {
        (self.choice, self.conflict)
    }
}

impl fmt::Debug for Retain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let choice = match &self.choice {
            None => "none",
            Some(Keep::Forever) => "keep",
            Some(Keep::For(_)) => "keep_for",
            Some(Keep::Until(_)) => "keep_until",
        };
        f.debug_struct("Retain")
            .field("choice", &choice)
            .field("conflict", &self.conflict)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_pick_is_rejected_and_first_stays() {
        let mut retain = Retain::default();
        retain.keep().unwrap();
        assert_eq!(
            retain.keep_for(Duration::from_millis(50)),
            Err(UsageError::DuplicateKeep)
        );
        let (choice, conflict) = retain.into_parts();
        assert!(matches!(choice, Some(Keep::Forever)));
        assert!(conflict);
    }

    #[test]
    fn untouched_retain_has_no_choice() {
        let (choice, conflict) = Retain::default().into_parts();
        assert!(choice.is_none());
        assert!(!conflict);
    }
}
