use std::sync::Arc;

use quickdesk_core::api::profile::ensure_profile;
use quickdesk_core::model::{Profile, Role};
use quickdesk_core::{
    access, AuthContext, DeskError, DeskServices, FunctionInfo, FunctionKind, MutationContext,
    QueryContext, RequestMetadata, Result,
};
use serde_json::Value;

use super::registry::{FunctionEntry, FunctionRegistry};

pub enum RouteResult {
    Query(Value),
    Mutation(Value),
}

/// Resolves the caller and dispatches a call to its function.
pub struct FunctionRouter {
    registry: Arc<FunctionRegistry>,
    services: Arc<DeskServices>,
}

impl FunctionRouter {
    pub fn new(registry: Arc<FunctionRegistry>, services: Arc<DeskServices>) -> Self {
        Self { registry, services }
    }

    pub fn services(&self) -> &Arc<DeskServices> {
        &self.services
    }

    pub async fn route(
        &self,
        function_name: &str,
        args: Value,
        auth: AuthContext,
        request: RequestMetadata,
    ) -> Result<RouteResult> {
        let entry = self.registry.get(function_name).ok_or_else(|| {
            DeskError::NotFound(format!("Function '{}' not found", function_name))
        })?;

        let viewer = self.resolve_viewer(&auth).await?;
        check_role(entry.info(), &viewer)?;

        match entry {
            FunctionEntry::Query { handler, .. } => {
                let ctx = QueryContext::new(self.services.clone(), viewer, auth, request);
                Ok(RouteResult::Query(handler(&ctx, args).await?))
            }
            FunctionEntry::Mutation { handler, .. } => {
                let ctx = MutationContext::new(self.services.clone(), viewer, auth, request);
                Ok(RouteResult::Mutation(handler(&ctx, args).await?))
            }
        }
    }

    /// The caller's profile, provisioned on first sight.
    pub async fn resolve_viewer(&self, auth: &AuthContext) -> Result<Profile> {
        if !auth.is_authenticated() {
            return Err(DeskError::Unauthorized("Authentication required".into()));
        }
        ensure_profile(&self.services, auth).await
    }

    pub fn has_function(&self, function_name: &str) -> bool {
        self.registry.get(function_name).is_some()
    }

    pub fn get_function_kind(&self, function_name: &str) -> Option<FunctionKind> {
        self.registry.get(function_name).map(|e| e.kind())
    }

    pub fn get_function_info(&self, function_name: &str) -> Option<&FunctionInfo> {
        self.registry.get(function_name).map(|e| e.info())
    }
}

fn check_role(info: &FunctionInfo, viewer: &Profile) -> Result<()> {
    match info.required_role {
        Some(Role::Admin) => access::require_admin(viewer),
        Some(Role::SupportAgent) => access::require_staff(viewer),
        Some(Role::EndUser) | None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use quickdesk_core::testing::TestDesk;
    use serde_json::json;
    use uuid::Uuid;

    fn router(desk: &TestDesk) -> FunctionRouter {
        FunctionRouter::new(
            Arc::new(FunctionRegistry::with_desk_functions()),
            desk.services(),
        )
    }

    fn auth_for(profile: &Profile) -> AuthContext {
        AuthContext::authenticated(profile.id, Some(profile.email.clone()), HashMap::new())
    }

    #[tokio::test]
    async fn test_unknown_function() {
        let desk = TestDesk::new();
        let result = router(&desk)
            .route("drop_tables", json!({}), AuthContext::unauthenticated(), RequestMetadata::new())
            .await;
        assert!(matches!(result, Err(DeskError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_requires_authentication() {
        let desk = TestDesk::new();
        let result = router(&desk)
            .route("list_tickets", Value::Null, AuthContext::unauthenticated(), RequestMetadata::new())
            .await;
        assert!(matches!(result, Err(DeskError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_admin_function_forbidden_for_agent() {
        let desk = TestDesk::new();
        let agent = desk.store.seed_profile("Sam", Role::SupportAgent);
        let result = router(&desk)
            .route("list_users", Value::Null, auth_for(&agent), RequestMetadata::new())
            .await;
        assert!(matches!(result, Err(DeskError::Forbidden { .. })));

        let admin = desk.store.seed_profile("Ada", Role::Admin);
        let result = router(&desk)
            .route("list_users", Value::Null, auth_for(&admin), RequestMetadata::new())
            .await
            .unwrap();
        match result {
            RouteResult::Query(users) => assert_eq!(users.as_array().unwrap().len(), 2),
            RouteResult::Mutation(_) => panic!("expected a query"),
        }
    }

    #[tokio::test]
    async fn test_first_call_provisions_profile() {
        let desk = TestDesk::new();
        let id = Uuid::new_v4();
        let auth = AuthContext::authenticated(id, Some("new@example.com".into()), HashMap::new());

        let result = router(&desk)
            .route("get_session", Value::Null, auth, RequestMetadata::new())
            .await
            .unwrap();
        let RouteResult::Query(session) = result else {
            panic!("expected a query");
        };
        assert_eq!(session["id"], json!(id));
        assert_eq!(session["role"], "end_user");
        assert_eq!(desk.mailer.recipients(), vec!["new@example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_bad_args_are_validation_errors() {
        let desk = TestDesk::new();
        let user = desk.store.seed_profile("Ann", Role::EndUser);
        let result = router(&desk)
            .route("get_ticket", json!({ "ticket_id": 42 }), auth_for(&user), RequestMetadata::new())
            .await;
        assert!(matches!(result, Err(DeskError::Validation(_))));
    }
}
