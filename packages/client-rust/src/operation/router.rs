//! Operation routing: dispatches a type-erased call to its handler by key.

use std::any::TypeId;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tower::Service;

use super::registry::{ErasedValue, OperationRegistry};
use super::scope::Scope;
use crate::client::Client;
use crate::error::OperationError;

// ---------------------------------------------------------------------------
// OperationContext
// ---------------------------------------------------------------------------

/// Context carried with every dispatched operation through the pipeline.
#[derive(Debug, Clone)]
pub struct OperationContext {
    /// Client-unique, monotonically increasing call id.
    pub call_id: u64,
    pub key: &'static str,
    /// Nesting depth of the operation's scope (0 for a top-level run).
    pub depth: u32,
    /// Cooperative deadline applied by the deadline middleware.
    pub timeout: Option<Duration>,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// One type-erased operation call travelling through the pipeline.
pub struct Dispatch {
    pub ctx: OperationContext,
    pub scope: Scope,
    pub(crate) client: Client,
    pub(crate) input: ErasedValue,
    pub(crate) input_type: TypeId,
    pub(crate) output_type: TypeId,
}

impl std::fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatch")
            .field("ctx", &self.ctx)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// OperationRouter
// ---------------------------------------------------------------------------

/// Routes a [`Dispatch`] to the handler registered under its key.
///
/// The innermost service of the pipeline. For each call it:
/// 1. resolves the handler (`Unregistered` if missing),
/// 2. checks the handler was registered for the caller's types,
/// 3. checks the scope for cancellation, so an operation cancelled before it
///    starts performs no work at all,
/// 4. invokes the handler.
#[derive(Clone)]
pub struct OperationRouter {
    registry: Arc<OperationRegistry>,
}

impl OperationRouter {
    #[must_use]
    pub fn new(registry: Arc<OperationRegistry>) -> Self {
        Self { registry }
    }
}

impl Service<Dispatch> for OperationRouter {
    type Response = ErasedValue;
    type Error = OperationError;
    type Future = BoxFuture<'static, Result<ErasedValue, OperationError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, dispatch: Dispatch) -> Self::Future {
        let key = dispatch.ctx.key;
        let entry = match self.registry.resolve(key) {
            Ok(entry) => entry,
            Err(e) => return Box::pin(async move { Err(e) }),
        };
        if !entry.accepts(dispatch.input_type, dispatch.output_type) {
            return Box::pin(async move { Err(OperationError::TypeMismatch { key }) });
        }
        if let Err(e) = dispatch.scope.throw_if_canceled() {
            return Box::pin(async move { Err(e) });
        }
        entry
            .handler()
            .call(dispatch.input, dispatch.client, dispatch.scope)
    }
}

/// Builds a `u64 -> u64` dispatch against an empty client.
#[cfg(test)]
pub(crate) fn make_dispatch(key: &'static str, input: u64, scope: Scope) -> Dispatch {
    let client = Client::builder(Arc::new(ledgerkit_core::InMemoryLedger::new()))
        .build()
        .expect("empty client builds");
    Dispatch {
        ctx: OperationContext {
            call_id: 1,
            key,
            depth: scope.depth(),
            timeout: None,
        },
        scope,
        client,
        input: Box::new(input),
        input_type: TypeId::of::<u64>(),
        output_type: TypeId::of::<u64>(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tower::ServiceExt;

    use super::*;
    use crate::operation::descriptor::OperationDescriptor;
    use crate::operation::registry::handler_fn;

    const DOUBLE: OperationDescriptor<u64, u64> = OperationDescriptor::new("Double");

    fn router_with(calls: Arc<AtomicU32>) -> OperationRouter {
        let mut registry = OperationRegistry::new();
        registry
            .register(
                DOUBLE,
                handler_fn(move |n: u64, _client, _scope| {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(n * 2)
                    }
                }),
            )
            .unwrap();
        OperationRouter::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn routes_to_registered_handler() {
        let calls = Arc::new(AtomicU32::new(0));
        let router = router_with(Arc::clone(&calls));

        let out = router
            .oneshot(make_dispatch("Double", 21, Scope::new()))
            .await
            .unwrap();
        assert_eq!(*out.downcast::<u64>().unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_key_returns_error() {
        let router = router_with(Arc::new(AtomicU32::new(0)));
        let err = router
            .oneshot(make_dispatch("Triple", 1, Scope::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::Unregistered { key } if key == "Triple"));
    }

    #[tokio::test]
    async fn canceled_scope_never_reaches_handler() {
        let calls = Arc::new(AtomicU32::new(0));
        let router = router_with(Arc::clone(&calls));
        let scope = Scope::new();
        scope.cancel();

        let err = router
            .oneshot(make_dispatch("Double", 1, scope))
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::Canceled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn mismatched_types_are_rejected() {
        let router = router_with(Arc::new(AtomicU32::new(0)));
        let mut dispatch = make_dispatch("Double", 1, Scope::new());
        dispatch.output_type = TypeId::of::<String>();

        let err = router.oneshot(dispatch).await.unwrap_err();
        assert!(matches!(err, OperationError::TypeMismatch { key: "Double" }));
    }
}
