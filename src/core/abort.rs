//! # Racing futures against a cancellation token.
//!
//! [`abortable`] is how every registry future observes cancellation: the
//! wrapped future settles normally unless the token fires first, in which case
//! it resolves to [`EventError::Abort`].
//!
//! ## Rules
//! - The inner future is polled **first**: a value that is already available
//!   wins over a token that fired in the same turn.
//! - Abort rejections are expected; swallow them at the boundary that owns the token.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::EventError;

/// Races `fut` against `token`.
pub async fn abortable<T, F>(token: CancellationToken, fut: F) -> Result<T, EventError>
where
    F: Future<Output = Result<T, EventError>>,
{
    tokio::select! {
        biased;
        res = fut => res,
        _ = token.cancelled() => Err(EventError::Abort),
    }
}
