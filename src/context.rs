//! Per-call cancellation and deadlines.

use crate::{Error, Result};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation scope for one or more calls.
///
/// Every [`Client`](crate::Client) operation takes a context. Once the
/// context is cancelled or its deadline passes, pending network I/O and
/// backoff sleeps unblock promptly and the call returns
/// [`Error::Cancelled`] or [`Error::DeadlineExceeded`]. A context that is
/// already done when a call starts fails it before any request is sent.
///
/// # Examples
///
/// ```
/// use hyperping_client::RequestContext;
/// use std::time::Duration;
///
/// let ctx = RequestContext::new().with_timeout(Duration::from_secs(10));
/// assert!(!ctx.is_done());
///
/// let child = ctx.child();
/// ctx.cancel();
/// assert!(child.is_done());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context that is never done unless cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing cancellation token.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Sets an absolute deadline. An earlier existing deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Sets a deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// A context cancelled whenever this one is, with the same deadline.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancels this context and all of its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The deadline, if one was set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` once cancelled or past the deadline.
    pub fn is_done(&self) -> bool {
        self.check().is_err()
    }

    /// Returns the error a call should fail with if the context is done.
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Error::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Resolves with the reason once the context is done.
    pub async fn done(&self) -> Error {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => Error::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => Error::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                Error::Cancelled
            }
        }
    }

    /// Sleeps for `duration` unless the context finishes first.
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        self.check()?;
        tokio::select! {
            biased;
            reason = self.done() => Err(reason),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
