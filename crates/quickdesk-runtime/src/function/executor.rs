use std::sync::Arc;
use std::time::{Duration, Instant};

use quickdesk_core::{AuthContext, DeskError, DeskServices, FunctionKind, RequestMetadata, Result};
use serde_json::Value;
use tokio::time::timeout;

use super::registry::FunctionRegistry;
use super::router::{FunctionRouter, RouteResult};

/// Runs desk functions under a deadline and logs the outcome.
pub struct FunctionExecutor {
    router: Arc<FunctionRouter>,
    default_timeout: Duration,
}

impl FunctionExecutor {
    pub fn new(registry: Arc<FunctionRegistry>, services: Arc<DeskServices>) -> Self {
        Self::with_timeout(registry, services, Duration::from_secs(30))
    }

    pub fn with_timeout(
        registry: Arc<FunctionRegistry>,
        services: Arc<DeskServices>,
        default_timeout: Duration,
    ) -> Self {
        Self::from_router(Arc::new(FunctionRouter::new(registry, services)), default_timeout)
    }

    pub fn from_router(router: Arc<FunctionRouter>, default_timeout: Duration) -> Self {
        Self {
            router,
            default_timeout,
        }
    }

    pub fn router(&self) -> &Arc<FunctionRouter> {
        &self.router
    }

    pub async fn execute(
        &self,
        function_name: &str,
        args: Value,
        auth: AuthContext,
        request: RequestMetadata,
    ) -> Result<ExecutionResult> {
        let start = Instant::now();
        let fn_timeout = self.function_timeout(function_name);
        let user_id = auth.user_id();

        let outcome = match timeout(
            fn_timeout,
            self.router.route(function_name, args, auth, request),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(DeskError::Timeout(format!(
                "Function '{}' timed out after {:?}",
                function_name, fn_timeout
            ))),
        };
        let duration = start.elapsed();

        match outcome {
            Ok(routed) => {
                let (kind, value) = match routed {
                    RouteResult::Query(v) => (FunctionKind::Query, v),
                    RouteResult::Mutation(v) => (FunctionKind::Mutation, v),
                };
                tracing::debug!(
                    function = function_name,
                    kind = %kind,
                    duration_ms = duration.as_millis() as u64,
                    "Function executed"
                );
                Ok(ExecutionResult {
                    function_name: function_name.to_string(),
                    function_kind: kind.to_string(),
                    result: value,
                    duration,
                })
            }
            Err(e) => {
                match &e {
                    DeskError::Validation(_)
                    | DeskError::InvalidArgument(_)
                    | DeskError::NotFound(_)
                    | DeskError::Unauthorized(_)
                    | DeskError::Forbidden { .. }
                    | DeskError::Conflict(_) => tracing::debug!(
                        function = function_name,
                        user_id = ?user_id,
                        error = %e,
                        "Function rejected"
                    ),
                    _ => tracing::error!(
                        function = function_name,
                        user_id = ?user_id,
                        duration_ms = duration.as_millis() as u64,
                        error = %e,
                        "Function failed"
                    ),
                }
                Err(e)
            }
        }
    }

    fn function_timeout(&self, function_name: &str) -> Duration {
        self.router
            .get_function_info(function_name)
            .and_then(|info| info.timeout)
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout)
    }

    pub fn has_function(&self, function_name: &str) -> bool {
        self.router.has_function(function_name)
    }
}

/// A successful call.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionResult {
    pub function_name: String,
    pub function_kind: String,
    pub result: Value,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use quickdesk_core::model::Role;
    use quickdesk_core::testing::TestDesk;
    use serde_json::json;

    #[test]
    fn test_execution_result_serialization() {
        let result = ExecutionResult {
            function_name: "list_tickets".to_string(),
            function_kind: "query".to_string(),
            result: json!({ "items": [] }),
            duration: Duration::from_millis(42),
        };

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"duration\":42"));
        assert!(json.contains("\"function_kind\":\"query\""));
    }

    #[tokio::test]
    async fn test_execute_mutation() {
        let desk = TestDesk::new();
        let user = desk.store.seed_profile("Ann", Role::EndUser);
        let category = desk.store.seed_category("Hardware");
        let executor = FunctionExecutor::new(
            Arc::new(FunctionRegistry::with_desk_functions()),
            desk.services(),
        );

        let auth = AuthContext::authenticated(user.id, Some(user.email.clone()), HashMap::new());
        let result = executor
            .execute(
                "create_ticket",
                json!({
                    "title": "Monitor flickers",
                    "description": "Since this morning",
                    "category_id": category.id,
                }),
                auth,
                RequestMetadata::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.function_kind, "mutation");
        assert_eq!(result.result["title"], "Monitor flickers");
        assert_eq!(desk.store.ticket_count(), 1);
    }
}
