use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use quickdesk_core::realtime::Change;
use quickdesk_core::{DeskConfig, DeskServices};
use serde::Serialize;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::{auth_middleware, AuthConfig, AuthMiddleware};
use super::files::file_handler;
use super::rpc::{rpc_function_handler, rpc_handler, RpcHandler};
use super::tracing::tracing_middleware;
use super::upload::{upload_handler, UploadState};
use super::websocket::{ws_handler, WsState};
use crate::function::{FunctionExecutor, FunctionRegistry, FunctionRouter};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub request_timeout_secs: u64,
    /// Empty or containing `*` allows any origin.
    pub cors_origins: Vec<String>,
    pub auth: AuthConfig,
    /// Per-file upload ceiling.
    pub max_upload_bytes: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            request_timeout_secs: 30,
            cors_origins: Vec::new(),
            auth: AuthConfig::default(),
            max_upload_bytes: 100 * 1024 * 1024,
        }
    }
}

impl GatewayConfig {
    pub fn from_desk_config(config: &DeskConfig) -> Self {
        Self {
            port: config.gateway.port,
            request_timeout_secs: config.gateway.request_timeout_secs,
            cors_origins: config.gateway.cors_origins.clone(),
            auth: AuthConfig::from_security(&config.security),
            max_upload_bytes: config.storage.max_file_size_bytes(),
        }
    }

    fn cors(&self) -> CorsLayer {
        let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
        if self.cors_origins.is_empty() || self.cors_origins.iter().any(|o| o == "*") {
            base.allow_origin(Any)
        } else {
            let origins: Vec<_> = self
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            base.allow_origin(origins)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub struct GatewayServer {
    config: GatewayConfig,
    router: Arc<FunctionRouter>,
    changes: broadcast::Sender<Change>,
}

impl GatewayServer {
    pub fn new(
        config: GatewayConfig,
        registry: FunctionRegistry,
        services: Arc<DeskServices>,
        changes: broadcast::Sender<Change>,
    ) -> Self {
        Self {
            config,
            router: Arc::new(FunctionRouter::new(Arc::new(registry), services)),
            changes,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The axum application.
    pub fn router(&self) -> Router {
        let executor = Arc::new(FunctionExecutor::from_router(
            self.router.clone(),
            Duration::from_secs(self.config.request_timeout_secs),
        ));
        let rpc_state = Arc::new(RpcHandler::new(executor));
        let upload_state = Arc::new(UploadState {
            router: self.router.clone(),
            hard_limit_bytes: self.config.max_upload_bytes,
        });
        let body_limit = upload_state.body_limit();
        let auth_state = Arc::new(AuthMiddleware::new(self.config.auth.clone()));
        let ws_state = Arc::new(WsState {
            router: self.router.clone(),
            auth: auth_state.clone(),
            changes: self.changes.clone(),
        });
        let objects = self.router.services().objects.clone();

        Router::new()
            .route("/health", get(health_handler))
            .route("/rpc", post(rpc_handler).with_state(rpc_state.clone()))
            .route(
                "/rpc/{function}",
                post(rpc_function_handler).with_state(rpc_state),
            )
            .route(
                "/tickets/{ticket_id}/attachments",
                post(upload_handler)
                    .with_state(upload_state)
                    .layer(DefaultBodyLimit::max(body_limit)),
            )
            .route("/storage/{*path}", get(file_handler).with_state(objects))
            .route("/realtime", get(ws_handler).with_state(ws_state))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(self.config.cors())
                    .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
                    .layer(middleware::from_fn(tracing_middleware)),
            )
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.config.port))
    }

    /// Serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.addr();
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_config_from_desk_config() {
        let mut desk = DeskConfig::default_with_database_url("postgres://localhost/desk");
        desk.gateway.port = 9090;
        desk.storage.max_file_size_mb = 5;
        let config = GatewayConfig::from_desk_config(&desk);
        assert_eq!(config.port, 9090);
        assert_eq!(config.max_upload_bytes, 5 * 1024 * 1024);
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn test_health_response_serialization() {
        let resp = HealthResponse {
            status: "healthy".to_string(),
            version: "0.1.0".to_string(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
    }
}
