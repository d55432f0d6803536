//! HTTP surface: RPC, attachment upload and download, realtime.

mod auth;
mod files;
mod request;
mod response;
mod rpc;
mod server;
mod tracing;
mod upload;
mod websocket;

pub use auth::{auth_middleware, bearer_token, AuthConfig, AuthError, AuthMiddleware, JwtAlgorithm};
pub use files::content_type_for;
pub use request::RpcRequest;
pub use response::{RpcError, RpcResponse};
pub use rpc::RpcHandler;
pub use server::{GatewayConfig, GatewayServer, HealthResponse};
pub use self::tracing::{TracingState, REQUEST_ID_HEADER, TRACE_ID_HEADER};
pub use upload::MAX_FILES_PER_REQUEST;
pub use websocket::{ClientMessage, ServerMessage, Session};
