//! Cooperative cancellation for operations that interleave storage calls.
//!
//! Pure computation (scoring, ranking, packing) never checks for
//! cancellation. Traversal, candidate loading and consolidation call
//! [`Cancellation::check`] before each further storage call, so a tripped
//! token or passed deadline stops the operation at the next boundary.

use crate::{Error, Result};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Caller-supplied cancellation token and/or deadline.
///
/// The default value never cancels.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    token: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// Creates a cancellation that never fires.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Creates a cancellation driven by a token.
    #[must_use]
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token: Some(token),
            deadline: None,
        }
    }

    /// Creates a cancellation that fires once `timeout` has elapsed.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: None,
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Adds a deadline to an existing cancellation.
    #[must_use]
    pub const fn and_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Returns true if the token fired or the deadline passed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        if self.token.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return true;
        }
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fails with [`Error::Cancelled`] if cancellation has been requested.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] naming `operation`.
    pub fn check(&self, operation: &str) -> Result<()> {
        if self.is_cancelled() {
            tracing::debug!(operation, "operation cancelled at storage boundary");
            return Err(Error::Cancelled {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }
}
