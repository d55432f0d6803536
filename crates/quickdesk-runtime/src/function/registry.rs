use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use quickdesk_core::api::{self, Registrar};
use quickdesk_core::{
    DeskError, DeskMutation, DeskQuery, FunctionInfo, FunctionKind, MutationContext, QueryContext,
    Result,
};
use serde_json::Value;

/// A query taking and returning JSON.
pub type BoxedQueryFn = Arc<
    dyn Fn(&QueryContext, Value) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + '_>>
        + Send
        + Sync,
>;

/// A mutation taking and returning JSON.
pub type BoxedMutationFn = Arc<
    dyn Fn(&MutationContext, Value) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + '_>>
        + Send
        + Sync,
>;

#[derive(Clone)]
pub enum FunctionEntry {
    Query {
        info: FunctionInfo,
        handler: BoxedQueryFn,
    },
    Mutation {
        info: FunctionInfo,
        handler: BoxedMutationFn,
    },
}

impl FunctionEntry {
    pub fn info(&self) -> &FunctionInfo {
        match self {
            FunctionEntry::Query { info, .. } => info,
            FunctionEntry::Mutation { info, .. } => info,
        }
    }

    pub fn kind(&self) -> FunctionKind {
        match self {
            FunctionEntry::Query { .. } => FunctionKind::Query,
            FunctionEntry::Mutation { .. } => FunctionKind::Mutation,
        }
    }
}

/// Parse JSON arguments. A missing body counts as `{}`.
fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| DeskError::Validation(e.to_string()))
}

/// Every desk function by name.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionEntry>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding all desk functions.
    pub fn with_desk_functions() -> Self {
        let mut registry = Self::new();
        api::register_all(&mut registry);
        registry
    }

    pub fn register_query<Q: DeskQuery>(&mut self)
    where
        Q::Args: Send + 'static,
        Q::Output: Send + 'static,
    {
        let info = Q::info();
        let name = info.name.to_string();

        let handler: BoxedQueryFn = Arc::new(move |ctx, args| {
            Box::pin(async move {
                let parsed: Q::Args = parse_args(args)?;
                let output = Q::execute(ctx, parsed).await?;
                serde_json::to_value(output).map_err(|e| DeskError::Internal(e.to_string()))
            })
        });

        self.functions
            .insert(name, FunctionEntry::Query { info, handler });
    }

    pub fn register_mutation<M: DeskMutation>(&mut self)
    where
        M::Args: Send + 'static,
        M::Output: Send + 'static,
    {
        let info = M::info();
        let name = info.name.to_string();

        let handler: BoxedMutationFn = Arc::new(move |ctx, args| {
            Box::pin(async move {
                let parsed: M::Args = parse_args(args)?;
                let output = M::execute(ctx, parsed).await?;
                serde_json::to_value(output).map_err(|e| DeskError::Internal(e.to_string()))
            })
        });

        self.functions
            .insert(name, FunctionEntry::Mutation { info, handler });
    }

    pub fn get(&self, name: &str) -> Option<&FunctionEntry> {
        self.functions.get(name)
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn queries(&self) -> impl Iterator<Item = (&str, &FunctionInfo)> {
        self.functions.iter().filter_map(|(name, entry)| match entry {
            FunctionEntry::Query { info, .. } => Some((name.as_str(), info)),
            _ => None,
        })
    }

    pub fn mutations(&self) -> impl Iterator<Item = (&str, &FunctionInfo)> {
        self.functions.iter().filter_map(|(name, entry)| match entry {
            FunctionEntry::Mutation { info, .. } => Some((name.as_str(), info)),
            _ => None,
        })
    }
}

impl Registrar for FunctionRegistry {
    fn query<Q: DeskQuery>(&mut self)
    where
        Q::Args: Send + 'static,
        Q::Output: Send + 'static,
    {
        self.register_query::<Q>();
    }

    fn mutation<M: DeskMutation>(&mut self)
    where
        M::Args: Send + 'static,
        M::Output: Send + 'static,
    {
        self.register_mutation::<M>();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickdesk_core::model::Role;

    #[test]
    fn test_empty_registry() {
        let registry = FunctionRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("list_tickets").is_none());
    }

    #[test]
    fn test_desk_functions_registered() {
        let registry = FunctionRegistry::with_desk_functions();
        assert_eq!(registry.queries().count(), 16);
        assert_eq!(registry.mutations().count(), 21);
        assert_eq!(registry.len(), 37);

        let entry = registry.get("create_ticket").unwrap();
        assert_eq!(entry.kind(), FunctionKind::Mutation);
        assert!(entry.info().required_role.is_none());

        let entry = registry.get("system_stats").unwrap();
        assert_eq!(entry.kind(), FunctionKind::Query);
        assert_eq!(entry.info().required_role, Some(Role::Admin));
    }

    #[test]
    fn test_admin_functions_are_marked() {
        let registry = FunctionRegistry::with_desk_functions();
        for name in [
            "list_users",
            "list_all_categories",
            "get_settings",
            "system_stats",
            "analytics",
            "update_user_role",
            "update_user",
            "create_category",
            "update_category",
            "toggle_category",
            "delete_category",
            "update_settings",
        ] {
            let info = registry.get(name).unwrap().info();
            assert_eq!(info.required_role, Some(Role::Admin), "{}", name);
        }
    }

    #[test]
    fn test_null_args_become_empty_object() {
        #[derive(serde::Deserialize)]
        struct Empty {}
        assert!(parse_args::<Empty>(Value::Null).is_ok());
        assert!(matches!(
            parse_args::<u32>(serde_json::json!("x")),
            Err(DeskError::Validation(_))
        ));
    }
}
