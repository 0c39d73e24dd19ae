//! Hierarchical cooperative cancellation and per-operation cleanup.
//!
//! Every dispatched operation runs inside its own [`Scope`], derived from
//! the caller's scope when one is supplied. Cancellation flows downward:
//! cancelling a scope cancels every live descendant, never its parent.
//!
//! Cancellation is only observed at explicit check points
//! ([`Scope::throw_if_canceled`]). Handlers performing several sequential
//! ledger calls check between calls; the latency between `cancel()` and the
//! handler stopping is bounded by the distance between two checks.
//!
//! Cleanup callbacks registered with [`Scope::on_cleanup`] run once, in
//! reverse registration order, when the owning operation exits. If the scope
//! is dropped without an explicit teardown (for instance because the caller
//! dropped the operation future) the remaining callbacks run on drop.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::OperationError;

type Cleanup = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

struct ScopeInner {
    token: CancellationToken,
    depth: u32,
    cleanups: Mutex<CleanupState>,
}

#[derive(Default)]
struct CleanupState {
    pending: Vec<Cleanup>,
    closed: bool,
}

/// Cancellation and cleanup context shared by an operation and the
/// operations it nests. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    /// Creates a root scope.
    #[must_use]
    pub fn new() -> Self {
        Self::from_token(CancellationToken::new(), 0)
    }

    fn from_token(token: CancellationToken, depth: u32) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                token,
                depth,
                cleanups: Mutex::new(CleanupState::default()),
            }),
        }
    }

    /// Derives a child that observes this scope's cancellation.
    ///
    /// The child has its own cleanup list; cancelling the child does not
    /// affect this scope.
    #[must_use]
    pub fn child(&self) -> Self {
        Self::from_token(self.inner.token.child_token(), self.inner.depth + 1)
    }

    /// Nesting depth: 0 for a root scope.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.inner.depth
    }

    /// Requests cancellation of this scope and all its descendants.
    /// Non-blocking; running handlers stop at their next check.
    pub fn cancel(&self) {
        self.inner.token.cancel();
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Cancellation check point.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::Canceled`] iff this scope (or an ancestor)
    /// has been cancelled.
    pub fn throw_if_canceled(&self) -> Result<(), OperationError> {
        if self.is_canceled() {
            Err(OperationError::Canceled)
        } else {
            Ok(())
        }
    }

    /// Resolves once the scope is cancelled. Useful inside `tokio::select!`
    /// for handlers that wait on something other than the ledger.
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await;
    }

    /// The underlying token, for interop with tokio-based collaborators.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.inner.token
    }

    /// Registers a callback to run when the owning operation exits.
    ///
    /// If the scope has already been torn down the callback runs immediately.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::Teardown`] with no primary error when the
    /// scope was already closed and the immediate run failed.
    pub fn on_cleanup<F>(&self, callback: F) -> Result<(), OperationError>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let mut state = self.inner.cleanups.lock();
        if !state.closed {
            state.pending.push(Box::new(callback));
            return Ok(());
        }
        drop(state);
        callback().map_err(|error| {
            warn!(%error, depth = self.depth(), "late cleanup callback failed");
            OperationError::Teardown {
                primary: None,
                failures: vec![error],
            }
        })
    }

    /// Runs all pending callbacks in reverse registration order and closes
    /// the scope. Every callback runs even if earlier ones fail; the
    /// failures are returned in execution order. Later calls return nothing.
    pub fn teardown(&self) -> Vec<anyhow::Error> {
        let pending = {
            let mut state = self.inner.cleanups.lock();
            state.closed = true;
            std::mem::take(&mut state.pending)
        };
        run_reversed(pending)
    }

    /// Tears the scope down and folds any cleanup failures into `result`.
    ///
    /// `result` is returned untouched when every callback succeeds.
    ///
    /// # Errors
    ///
    /// Returns the error in `result`, or [`OperationError::Teardown`] carrying
    /// it as `primary` when callbacks failed.
    pub fn finish<T>(&self, result: Result<T, OperationError>) -> Result<T, OperationError> {
        let failures = self.teardown();
        if failures.is_empty() {
            return result;
        }
        for error in &failures {
            warn!(%error, depth = self.depth(), "cleanup callback failed");
        }
        Err(OperationError::Teardown {
            primary: result.err().map(Box::new),
            failures,
        })
    }
}

fn run_reversed(pending: Vec<Cleanup>) -> Vec<anyhow::Error> {
    pending
        .into_iter()
        .rev()
        .filter_map(|callback| callback().err())
        .collect()
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("depth", &self.inner.depth)
            .field("canceled", &self.is_canceled())
            .finish_non_exhaustive()
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        let state = self.cleanups.get_mut();
        if state.closed || state.pending.is_empty() {
            return;
        }
        for error in run_reversed(std::mem::take(&mut state.pending)) {
            warn!(%error, depth = self.depth, "cleanup callback failed on drop");
        }
    }
}
