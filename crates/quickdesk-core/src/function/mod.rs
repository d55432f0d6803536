mod context;
mod traits;

pub use context::{AuthContext, DeskServices, MutationContext, QueryContext, RequestMetadata};
pub use traits::{DeskMutation, DeskQuery, FunctionInfo, FunctionKind};
