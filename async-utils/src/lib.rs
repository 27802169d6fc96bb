//! One-shot race helpers for the gate resolution pipeline.
//!
//! The resolver runs two kinds of "first signal wins" races: a network
//! exchange against a hard deadline, and a fallback request against an
//! externally armed cancellation fuse. Both are expressed here as
//! extension traits over arbitrary futures. The losing branch of a race
//! is a dropped future, so its completion can never be observed twice.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Error returned when the deadline fires before the future completes.
#[derive(Debug, PartialEq, Eq)]
pub struct Elapsed;

/// Error returned when the cancellation token fires first.
#[derive(Debug, PartialEq, Eq)]
pub struct Cancelled;

/// Race a future against a fixed deadline.
#[async_trait]
pub trait OrElapsedExt: Sized {
    type Output;

    /// Returns `Ok(output)` if the future completes within `deadline`,
    /// or `Err(Elapsed)` once the deadline fires. The future is dropped
    /// on timeout; no partial result leaks out.
    async fn or_elapsed(self, deadline: Duration) -> Result<Self::Output, Elapsed>;
}

#[async_trait]
impl<F> OrElapsedExt for F
where
    F: Future + Send,
    F::Output: Send,
{
    type Output = F::Output;

    async fn or_elapsed(self, deadline: Duration) -> Result<Self::Output, Elapsed> {
        tokio::time::timeout(deadline, self).await.map_err(|_| Elapsed)
    }
}

/// Race a future against a [`CancellationToken`].
#[async_trait]
pub trait OrCancelExt: Sized {
    type Output;

    /// Returns `Ok(output)` if the future completes before the token is
    /// cancelled, `Err(Cancelled)` otherwise.
    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, Cancelled>;
}

#[async_trait]
impl<F> OrCancelExt for F
where
    F: Future + Send,
    F::Output: Send,
{
    type Output = F::Output;

    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, Cancelled> {
        tokio::select! {
            _ = token.cancelled() => Err(Cancelled),
            out = self => Ok(out),
        }
    }
}
