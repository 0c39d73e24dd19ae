//! Tower middleware layers for the operation pipeline.
//!
//! - [`deadline`]: Cooperative per-operation deadline
//! - [`metrics`]: Scope teardown plus operation timing and outcome via `tracing` spans
//! - [`pipeline`]: Composes all layers into a single service stack

pub mod deadline;
pub mod metrics;
pub mod pipeline;

pub use deadline::DeadlineLayer;
pub use metrics::{MetricsLayer, Outcome};
pub use pipeline::{build_operation_pipeline, OperationPipeline};
