pub mod access;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod function;
pub mod model;
pub mod notify;
pub mod query;
pub mod realtime;
pub mod stats;
pub mod storage;
pub mod store;
pub mod validation;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use auth::{Claims, ClaimsBuilder};
pub use config::DeskConfig;
pub use error::{DeskError, Result};
pub use function::{
    AuthContext, DeskMutation, DeskQuery, DeskServices, FunctionInfo, FunctionKind,
    MutationContext, QueryContext, RequestMetadata,
};
pub use notify::{Mailer, Notifier};
pub use storage::ObjectStore;
pub use store::DeskStore;
