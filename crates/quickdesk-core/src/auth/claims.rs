use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Claims carried by an access token from the identity service.
///
/// Desk roles are not read from the token; the profile row is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// E-mail address the identity was registered with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Everything else the identity service put in the token.
    #[serde(flatten)]
    pub custom: HashMap<String, serde_json::Value>,
}

impl Claims {
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }

    pub fn is_expired(&self) -> bool {
        self.exp < chrono::Utc::now().timestamp()
    }

    pub fn get_claim(&self, key: &str) -> Option<&serde_json::Value> {
        self.custom.get(key)
    }

    /// Display name from `user_metadata.full_name`, when the token has one.
    pub fn full_name(&self) -> Option<&str> {
        self.custom
            .get("user_metadata")
            .and_then(|m| m.get("full_name"))
            .and_then(|v| v.as_str())
    }

    pub fn builder() -> ClaimsBuilder {
        ClaimsBuilder::new()
    }
}

/// Builder for token claims. Used by tests and the dev token helper.
#[derive(Debug)]
pub struct ClaimsBuilder {
    sub: Option<String>,
    email: Option<String>,
    custom: HashMap<String, serde_json::Value>,
    duration_secs: i64,
}

impl Default for ClaimsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimsBuilder {
    pub fn new() -> Self {
        Self {
            sub: None,
            email: None,
            custom: HashMap::new(),
            duration_secs: 3600,
        }
    }

    pub fn subject(mut self, sub: impl Into<String>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    pub fn user_id(mut self, id: Uuid) -> Self {
        self.sub = Some(id.to_string());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn claim(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.custom.insert(key.into(), value);
        self
    }

    /// Token lifetime in seconds. Negative values produce an expired token.
    pub fn duration_secs(mut self, secs: i64) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn build(self) -> Result<Claims, String> {
        let sub = self.sub.ok_or("Subject is required")?;
        let now = chrono::Utc::now().timestamp();

        Ok(Claims {
            sub,
            iat: now,
            exp: now + self.duration_secs,
            email: self.email,
            custom: self.custom,
        })
    }
}
