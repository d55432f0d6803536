use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use quickdesk_core::config::SecurityConfig;
use quickdesk_core::{AuthContext, Claims};

/// Token verification settings.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub algorithm: JwtAlgorithm,
    /// Accept tokens without checking the signature. Development only.
    pub skip_verification: bool,
}

impl AuthConfig {
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: secret.into(),
            ..Default::default()
        }
    }

    pub fn dev_mode() -> Self {
        Self {
            skip_verification: true,
            ..Default::default()
        }
    }

    pub fn from_security(security: &SecurityConfig) -> Self {
        Self {
            jwt_secret: security.auth.jwt_secret.clone().unwrap_or_default(),
            algorithm: JwtAlgorithm::HS256,
            skip_verification: security.auth.skip_verification,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JwtAlgorithm {
    #[default]
    HS256,
    HS384,
    HS512,
}

impl From<JwtAlgorithm> for Algorithm {
    fn from(alg: JwtAlgorithm) -> Self {
        match alg {
            JwtAlgorithm::HS256 => Algorithm::HS256,
            JwtAlgorithm::HS384 => Algorithm::HS384,
            JwtAlgorithm::HS512 => Algorithm::HS512,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingHeader,
    #[error("Invalid authorization header format")]
    InvalidHeader,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Token expired")]
    TokenExpired,
}

/// Verifies bearer tokens issued by the identity service.
#[derive(Clone)]
pub struct AuthMiddleware {
    config: Arc<AuthConfig>,
    decoding_key: Option<DecodingKey>,
}

impl std::fmt::Debug for AuthMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthMiddleware")
            .field("algorithm", &self.config.algorithm)
            .field("skip_verification", &self.config.skip_verification)
            .field("decoding_key", &self.decoding_key.is_some())
            .finish()
    }
}

impl AuthMiddleware {
    pub fn new(config: AuthConfig) -> Self {
        let decoding_key = if config.skip_verification || config.jwt_secret.is_empty() {
            None
        } else {
            Some(DecodingKey::from_secret(config.jwt_secret.as_bytes()))
        };

        Self {
            config: Arc::new(config),
            decoding_key,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        if self.config.skip_verification {
            return self.decode_unverified(token);
        }
        let key = self
            .decoding_key
            .as_ref()
            .ok_or_else(|| AuthError::InvalidToken("JWT secret not configured".to_string()))?;

        let mut validation = Validation::new(self.config.algorithm.into());
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 60;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<Claims>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidSignature => {
                    AuthError::InvalidToken("Invalid signature".to_string())
                }
                ErrorKind::InvalidToken => {
                    AuthError::InvalidToken("Invalid token format".to_string())
                }
                ErrorKind::MissingRequiredClaim(claim) => {
                    AuthError::InvalidToken(format!("Missing required claim: {}", claim))
                }
                _ => AuthError::InvalidToken(e.to_string()),
            })
    }

    fn decode_unverified(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let claims = decode::<Claims>(token, &DecodingKey::from_secret(b"unused"), &validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?
            .claims;

        // Expiry is enforced even without signature checks.
        if claims.is_expired() {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims)
    }

    /// Auth context for a raw token. Invalid tokens yield an anonymous context.
    pub fn authenticate(&self, token: &str) -> AuthContext {
        let claims = match self.validate_token(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "Rejected bearer token");
                return AuthContext::unauthenticated();
            }
        };
        match claims.user_id() {
            Some(user_id) => AuthContext::authenticated(user_id, claims.email, claims.custom),
            None => {
                tracing::debug!(sub = %claims.sub, "Token subject is not a user id");
                AuthContext::unauthenticated()
            }
        }
    }
}

/// The token of an `Authorization: Bearer` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidHeader)?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidHeader)
}

pub fn extract_auth_context(headers: &HeaderMap, middleware: &AuthMiddleware) -> AuthContext {
    match bearer_token(headers) {
        Ok(token) => middleware.authenticate(token),
        Err(_) => AuthContext::unauthenticated(),
    }
}

/// Put an [`AuthContext`] into the request extensions.
pub async fn auth_middleware(
    State(middleware): State<Arc<AuthMiddleware>>,
    mut req: Request,
    next: Next,
) -> Response {
    let auth = extract_auth_context(req.headers(), &middleware);
    req.extensions_mut().insert(auth);
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    fn claims(user_id: Uuid, expired: bool) -> Claims {
        Claims::builder()
            .user_id(user_id)
            .email("ann@example.com")
            .claim("aud", serde_json::json!("authenticated"))
            .duration_secs(if expired { -3600 } else { 3600 })
            .build()
            .unwrap()
    }

    fn token(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token() {
        let middleware = AuthMiddleware::new(AuthConfig::with_secret("s3cret"));
        let id = Uuid::new_v4();
        let validated = middleware.validate_token(&token(&claims(id, false), "s3cret")).unwrap();
        assert_eq!(validated.user_id(), Some(id));
        assert_eq!(validated.email.as_deref(), Some("ann@example.com"));
    }

    #[test]
    fn test_wrong_secret() {
        let middleware = AuthMiddleware::new(AuthConfig::with_secret("right"));
        let result = middleware.validate_token(&token(&claims(Uuid::new_v4(), false), "wrong"));
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_expired_token() {
        let middleware = AuthMiddleware::new(AuthConfig::with_secret("s"));
        let result = middleware.validate_token(&token(&claims(Uuid::new_v4(), true), "s"));
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_missing_secret_rejects() {
        let middleware = AuthMiddleware::new(AuthConfig::default());
        let result = middleware.validate_token(&token(&claims(Uuid::new_v4(), false), "s"));
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_dev_mode_skips_signature_but_not_expiry() {
        let middleware = AuthMiddleware::new(AuthConfig::dev_mode());
        assert!(middleware
            .validate_token(&token(&claims(Uuid::new_v4(), false), "anything"))
            .is_ok());
        assert!(matches!(
            middleware.validate_token(&token(&claims(Uuid::new_v4(), true), "anything")),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn test_authenticate_builds_context() {
        let middleware = AuthMiddleware::new(AuthConfig::with_secret("s"));
        let id = Uuid::new_v4();
        let auth = middleware.authenticate(&token(&claims(id, false), "s"));
        assert!(auth.is_authenticated());
        assert_eq!(auth.user_id(), Some(id));
        assert_eq!(auth.email(), Some("ann@example.com"));
        assert_eq!(auth.claim("aud"), Some(&serde_json::json!("authenticated")));

        let non_uuid = Claims::builder().subject("service-role").build().unwrap();
        assert!(!middleware.authenticate(&token(&non_uuid, "s")).is_authenticated());
        assert!(!middleware.authenticate("not-a-jwt").is_authenticated());
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(matches!(bearer_token(&headers), Err(AuthError::MissingHeader)));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(bearer_token(&headers), Err(AuthError::InvalidHeader)));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_from_security_config() {
        let mut security = SecurityConfig::default();
        security.auth.jwt_secret = Some("k".into());
        let config = AuthConfig::from_security(&security);
        assert_eq!(config.jwt_secret, "k");
        assert!(!config.skip_verification);
    }
}
