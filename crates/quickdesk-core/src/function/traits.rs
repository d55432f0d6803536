use std::future::Future;
use std::pin::Pin;

use serde::{de::DeserializeOwned, Serialize};

use super::context::{MutationContext, QueryContext};
use crate::error::Result;
use crate::model::Role;

/// Information about a registered function.
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    /// Function name (used for routing).
    pub name: &'static str,
    pub description: Option<&'static str>,
    pub kind: FunctionKind,
    /// Role the viewer must hold, checked before the function runs.
    pub required_role: Option<Role>,
    /// Timeout in seconds, overriding the gateway default.
    pub timeout: Option<u64>,
}

impl FunctionInfo {
    pub fn query(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description: Some(description),
            kind: FunctionKind::Query,
            required_role: None,
            timeout: None,
        }
    }

    pub fn mutation(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description: Some(description),
            kind: FunctionKind::Mutation,
            required_role: None,
            timeout: None,
        }
    }

    pub fn admin(mut self) -> Self {
        self.required_role = Some(Role::Admin);
        self
    }
}

/// The kind of function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Query,
    Mutation,
}

impl std::fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionKind::Query => write!(f, "query"),
            FunctionKind::Mutation => write!(f, "mutation"),
        }
    }
}

/// A read-only desk function.
pub trait DeskQuery: Send + Sync + 'static {
    type Args: DeserializeOwned + Serialize + Send + Sync;
    type Output: Serialize + Send;

    fn info() -> FunctionInfo;

    fn execute(
        ctx: &QueryContext,
        args: Self::Args,
    ) -> Pin<Box<dyn Future<Output = Result<Self::Output>> + Send + '_>>;
}

/// A desk function that writes.
///
/// Mutations are not wrapped in a transaction; each store call commits on
/// its own and notification fan-out runs after the write succeeded.
pub trait DeskMutation: Send + Sync + 'static {
    type Args: DeserializeOwned + Serialize + Send + Sync;
    type Output: Serialize + Send;

    fn info() -> FunctionInfo;

    fn execute(
        ctx: &MutationContext,
        args: Self::Args,
    ) -> Pin<Box<dyn Future<Output = Result<Self::Output>> + Send + '_>>;
}
