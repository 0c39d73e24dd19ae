//! Timing, outcome and teardown instrumentation for dispatched operations.
//!
//! Each call runs inside an `operation` span carrying the key, call id and
//! scope depth. When the handler returns, the layer tears the operation's
//! scope down, then records duration, outcome and the number of failed
//! cleanup callbacks on the span.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::error::OperationError;
use crate::operation::registry::ErasedValue;
use crate::operation::router::Dispatch;

/// How a dispatched operation ended, as recorded on its span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Canceled,
    Failed,
    /// The handler's result was replaced by cleanup failures.
    TeardownFailed,
}

impl Outcome {
    #[must_use]
    pub fn of<T>(result: &Result<T, OperationError>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(OperationError::Teardown { .. }) => Self::TeardownFailed,
            Err(e) if e.is_canceled() => Self::Canceled,
            Err(_) => Self::Failed,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Canceled => "canceled",
            Self::Failed => "error",
            Self::TeardownFailed => "teardown_failed",
        }
    }
}

fn teardown_failures(result: &Result<ErasedValue, OperationError>) -> usize {
    match result {
        Err(OperationError::Teardown { failures, .. }) => failures.len(),
        _ => 0,
    }
}

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer wrapping each operation in an instrumented `tracing` span and
/// closing its scope once the inner service completes.
#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S> Service<Dispatch> for MetricsService<S>
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
        let ctx = dispatch.ctx.clone();
        let scope = dispatch.scope.clone();

        let span = info_span!(
            "operation",
            key = ctx.key,
            call_id = ctx.call_id,
            depth = ctx.depth,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
            teardown_failures = tracing::field::Empty,
        );

        let fut = self.inner.call(dispatch);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = scope.finish(fut.await);
                let outcome = Outcome::of(&result);
                let failed_cleanups = teardown_failures(&result);

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = start.elapsed().as_millis() as u64;
                let span = tracing::Span::current();
                span.record("duration_ms", duration_ms);
                span.record("outcome", outcome.as_str());
                span.record("teardown_failures", failed_cleanups);

                tracing::debug!(
                    key = ctx.key,
                    call_id = ctx.call_id,
                    duration_ms,
                    outcome = outcome.as_str(),
                    "operation complete"
                );

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tower::ServiceExt;

    use super::*;
    use crate::operation::router::make_dispatch;
    use crate::operation::scope::Scope;

    /// Echoes the dispatch input back, or fails when the key says so.
    struct EchoService;

    impl Service<Dispatch> for EchoService {
        type Response = ErasedValue;
        type Error = OperationError;
        type Future = Pin<Box<dyn Future<Output = Result<ErasedValue, OperationError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, dispatch: Dispatch) -> Self::Future {
            Box::pin(async move {
                if dispatch.ctx.key == "Fail" {
                    Err(OperationError::Canceled)
                } else {
                    Ok(dispatch.input)
                }
            })
        }
    }

    #[tokio::test]
    async fn metrics_layer_passes_through_response() {
        let svc = MetricsLayer.layer(EchoService);
        let out = svc
            .oneshot(make_dispatch("Echo", 42, Scope::new()))
            .await
            .unwrap();
        assert_eq!(*out.downcast::<u64>().unwrap(), 42);
    }

    #[tokio::test]
    async fn metrics_layer_passes_through_error() {
        let svc = MetricsLayer.layer(EchoService);
        let err = svc
            .oneshot(make_dispatch("Fail", 1, Scope::new()))
            .await
            .unwrap_err();
        assert!(err.is_canceled());
    }

    #[tokio::test]
    async fn scope_is_closed_when_the_call_completes() {
        let scope = Scope::new();
        scope
            .on_cleanup(|| Err(anyhow::anyhow!("flush failed")))
            .unwrap();

        let err = MetricsLayer
            .layer(EchoService)
            .oneshot(make_dispatch("Echo", 1, scope.clone()))
            .await
            .unwrap_err();

        assert_eq!(Outcome::of::<()>(&Err(err)), Outcome::TeardownFailed);
        assert!(scope.teardown().is_empty());
    }

    #[test]
    fn outcome_classification() {
        assert_eq!(Outcome::of(&Ok::<_, OperationError>(())), Outcome::Ok);
        assert_eq!(
            Outcome::of::<()>(&Err(OperationError::Canceled)),
            Outcome::Canceled
        );
        assert_eq!(
            Outcome::of::<()>(&Err(OperationError::other("nope"))),
            Outcome::Failed
        );
        let teardown = OperationError::Teardown {
            primary: Some(Box::new(OperationError::Canceled)),
            failures: vec![anyhow::anyhow!("close failed")],
        };
        assert_eq!(Outcome::of::<()>(&Err(teardown)), Outcome::TeardownFailed);
        assert_eq!(Outcome::TeardownFailed.as_str(), "teardown_failed");
    }
}
