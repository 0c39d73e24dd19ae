//! The operation-dispatch framework: typed descriptors, the handler
//! registry, scopes, the tower pipeline, and the lazy/full record helpers.

pub mod descriptor;
pub mod hydration;
pub mod middleware;
pub mod registry;
pub mod router;
pub mod scope;

pub use descriptor::{OperationDescriptor, OperationInstance};
pub use hydration::{ensure_unchanged, Hydration};
pub use middleware::{build_operation_pipeline, OperationPipeline};
pub use registry::{handler_fn, ErasedValue, HandlerFn, OperationHandler, OperationRegistry, RegistryEntry};
pub use router::{Dispatch, OperationContext, OperationRouter};
pub use scope::Scope;
