mod executor;
mod registry;
mod router;

pub use executor::{ExecutionResult, FunctionExecutor};
pub use registry::{BoxedMutationFn, BoxedQueryFn, FunctionEntry, FunctionRegistry};
pub use router::{FunctionRouter, RouteResult};
