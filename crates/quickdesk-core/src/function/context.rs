use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{DeskError, Result};
use crate::model::Profile;
use crate::notify::Notifier;
use crate::storage::ObjectStore;
use crate::store::DeskStore;

/// Authentication context established by the gateway from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthContext {
    user_id: Option<Uuid>,
    email: Option<String>,
    claims: HashMap<String, serde_json::Value>,
    authenticated: bool,
}

impl AuthContext {
    pub fn unauthenticated() -> Self {
        Self {
            user_id: None,
            email: None,
            claims: HashMap::new(),
            authenticated: false,
        }
    }

    pub fn authenticated(
        user_id: Uuid,
        email: Option<String>,
        claims: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            user_id: Some(user_id),
            email,
            claims,
            authenticated: true,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    pub fn require_user_id(&self) -> Result<Uuid> {
        self.user_id
            .ok_or_else(|| DeskError::Unauthorized("Authentication required".into()))
    }

    /// E-mail from the token, used to provision a profile on first sign-in.
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn claim(&self, key: &str) -> Option<&serde_json::Value> {
        self.claims.get(key)
    }
}

/// Request metadata available to all functions.
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    /// Unique request ID.
    pub request_id: Uuid,
    /// Trace ID, taken from `x-trace-id` when the client sent one.
    pub trace_id: String,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl RequestMetadata {
    pub fn new() -> Self {
        Self::with_trace_id(Uuid::new_v4().to_string())
    }

    pub fn with_trace_id(trace_id: String) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            trace_id,
            client_ip: None,
            user_agent: None,
            timestamp: chrono::Utc::now(),
        }
    }
}

impl Default for RequestMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared services handed to every function.
pub struct DeskServices {
    pub store: Arc<dyn DeskStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub notifier: Notifier,
}

/// Context for query functions.
pub struct QueryContext {
    pub auth: AuthContext,
    pub request: RequestMetadata,
    viewer: Profile,
    services: Arc<DeskServices>,
}

impl QueryContext {
    pub fn new(
        services: Arc<DeskServices>,
        viewer: Profile,
        auth: AuthContext,
        request: RequestMetadata,
    ) -> Self {
        Self {
            auth,
            request,
            viewer,
            services,
        }
    }

    /// The profile this request acts as.
    pub fn viewer(&self) -> &Profile {
        &self.viewer
    }

    pub fn store(&self) -> &dyn DeskStore {
        self.services.store.as_ref()
    }

    pub fn objects(&self) -> &dyn ObjectStore {
        self.services.objects.as_ref()
    }
}

/// Context for mutation functions. Adds notification delivery.
pub struct MutationContext {
    pub auth: AuthContext,
    pub request: RequestMetadata,
    viewer: Profile,
    services: Arc<DeskServices>,
}

impl MutationContext {
    pub fn new(
        services: Arc<DeskServices>,
        viewer: Profile,
        auth: AuthContext,
        request: RequestMetadata,
    ) -> Self {
        Self {
            auth,
            request,
            viewer,
            services,
        }
    }

    pub fn viewer(&self) -> &Profile {
        &self.viewer
    }

    pub fn store(&self) -> &dyn DeskStore {
        self.services.store.as_ref()
    }

    pub fn objects(&self) -> &dyn ObjectStore {
        self.services.objects.as_ref()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.services.notifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthenticated() {
        let auth = AuthContext::unauthenticated();
        assert!(!auth.is_authenticated());
        assert!(matches!(
            auth.require_user_id(),
            Err(DeskError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_authenticated() {
        let id = Uuid::new_v4();
        let mut claims = HashMap::new();
        claims.insert("aud".to_string(), serde_json::json!("authenticated"));
        let auth = AuthContext::authenticated(id, Some("a@b.io".into()), claims);
        assert_eq!(auth.require_user_id().unwrap(), id);
        assert_eq!(auth.email(), Some("a@b.io"));
        assert_eq!(auth.claim("aud"), Some(&serde_json::json!("authenticated")));
    }

    #[test]
    fn test_request_metadata_trace_id() {
        let meta = RequestMetadata::with_trace_id("trace-1".into());
        assert_eq!(meta.trace_id, "trace-1");
        assert_ne!(RequestMetadata::new().request_id, meta.request_id);
    }
}
