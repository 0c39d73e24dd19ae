//! Pipeline composition: wraps the router in the middleware stack.

use tower::util::BoxCloneService;
use tower::ServiceBuilder;

use super::deadline::DeadlineLayer;
use super::metrics::MetricsLayer;
use crate::error::OperationError;
use crate::operation::registry::ErasedValue;
use crate::operation::router::{Dispatch, OperationRouter};

/// The boxed service every operation call goes through.
pub type OperationPipeline = BoxCloneService<Dispatch, ErasedValue, OperationError>;

/// Build the operation pipeline by wrapping the `OperationRouter` with middleware layers.
///
/// Layer order (outermost to innermost):
/// 1. `DeadlineLayer` -- cancel the scope once the operation's deadline passes
/// 2. `MetricsLayer` -- tear the scope down and record timing and outcome (closest to the handler)
#[must_use]
pub fn build_operation_pipeline(router: OperationRouter) -> OperationPipeline {
    BoxCloneService::new(
        ServiceBuilder::new()
            .layer(DeadlineLayer)
            .layer(MetricsLayer)
            .service(router),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
