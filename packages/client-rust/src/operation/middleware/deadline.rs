//! Cooperative per-operation deadline.
//!
//! When the deadline in [`OperationContext::timeout`] elapses the operation's
//! scope is cancelled and the handler is left to observe it at its next
//! check point. The handler future is never dropped mid-flight, so cleanup
//! callbacks and nested operations unwind normally.
//!
//! [`OperationContext::timeout`]: crate::operation::router::OperationContext::timeout

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::{Layer, Service};
use tracing::warn;

use crate::error::OperationError;
use crate::operation::registry::ErasedValue;
use crate::operation::router::Dispatch;

// ---------------------------------------------------------------------------
// DeadlineLayer
// ---------------------------------------------------------------------------

/// Tower layer that cancels an operation's scope once its deadline passes.
#[derive(Debug, Clone)]
pub struct DeadlineLayer;

impl<S> Layer<S> for DeadlineLayer {
    type Service = DeadlineService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DeadlineService { inner }
    }
}

// ---------------------------------------------------------------------------
// DeadlineService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DeadlineService<S> {
    inner: S,
}

impl<S> Service<Dispatch> for DeadlineService<S>
where
    S: Service<Dispatch, Response = ErasedValue, Error = OperationError> + Send,
    S::Future: Send + 'static,
{
    type Response = ErasedValue;
    type Error = OperationError;
    type Future = Pin<Box<dyn Future<Output = Result<ErasedValue, OperationError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, dispatch: Dispatch) -> Self::Future {
        let Some(timeout) = dispatch.ctx.timeout else {
            return Box::pin(self.inner.call(dispatch));
        };
        let key = dispatch.ctx.key;
        let scope = dispatch.scope.clone();
        let mut fut = Box::pin(self.inner.call(dispatch));

        Box::pin(async move {
            tokio::select! {
                biased;
                result = &mut fut => return result,
                () = tokio::time::sleep(timeout) => {
                    #[allow(clippy::cast_possible_truncation)]
                    let timeout_ms = timeout.as_millis() as u64;
                    warn!(key, timeout_ms, "operation deadline elapsed, cancelling scope");
                    scope.cancel();
                }
            }
            fut.await
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
