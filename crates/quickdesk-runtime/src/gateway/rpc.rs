use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Extension, Path, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use quickdesk_core::{AuthContext, RequestMetadata};

use super::request::RpcRequest;
use super::response::{RpcError, RpcResponse};
use super::tracing::TracingState;
use crate::function::FunctionExecutor;

/// Runs RPC calls through the executor and wraps the outcome.
#[derive(Clone)]
pub struct RpcHandler {
    executor: Arc<FunctionExecutor>,
}

impl RpcHandler {
    pub fn new(executor: Arc<FunctionExecutor>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &Arc<FunctionExecutor> {
        &self.executor
    }

    pub async fn handle(
        &self,
        request: RpcRequest,
        auth: AuthContext,
        metadata: RequestMetadata,
    ) -> RpcResponse {
        let request_id = metadata.request_id.to_string();

        if !self.executor.has_function(&request.function) {
            return RpcResponse::error(RpcError::not_found(format!(
                "Function '{}' not found",
                request.function
            )))
            .with_request_id(request_id);
        }

        match self
            .executor
            .execute(&request.function, request.args, auth, metadata)
            .await
        {
            Ok(result) => RpcResponse::success(result.result).with_request_id(request_id),
            Err(e) => RpcResponse::error(RpcError::from(e)).with_request_id(request_id),
        }
    }
}

pub(crate) fn request_metadata(tracing: &TracingState, headers: &HeaderMap) -> RequestMetadata {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };
    let client_ip = header_str("x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
        .or_else(|| header_str("x-real-ip"));
    tracing.metadata(client_ip, header_str(header::USER_AGENT.as_str()))
}

/// `POST /rpc` with `{function, args}`.
pub async fn rpc_handler(
    State(handler): State<Arc<RpcHandler>>,
    Extension(auth): Extension<AuthContext>,
    Extension(tracing): Extension<TracingState>,
    headers: HeaderMap,
    Json(request): Json<RpcRequest>,
) -> RpcResponse {
    let metadata = request_metadata(&tracing, &headers);
    handler.handle(request, auth, metadata).await
}

/// `POST /rpc/{function}` with the arguments as the body. An empty body
/// means no arguments.
pub async fn rpc_function_handler(
    State(handler): State<Arc<RpcHandler>>,
    Extension(auth): Extension<AuthContext>,
    Extension(tracing): Extension<TracingState>,
    Path(function): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> RpcResponse {
    let metadata = request_metadata(&tracing, &headers);

    let args = if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::Value::Null
    } else {
        match serde_json::from_slice(&body) {
            Ok(args) => args,
            Err(e) => {
                return RpcResponse::error(RpcError::validation(format!(
                    "Request body is not valid JSON: {}",
                    e
                )))
                .with_request_id(metadata.request_id.to_string())
            }
        }
    };

    handler
        .handle(RpcRequest::new(function, args), auth, metadata)
        .await
}
