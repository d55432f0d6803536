//! Server side of QuickDesk: Postgres persistence, the HTTP gateway, the
//! realtime feed and the delivery backends the desk functions run on.

pub mod db;
pub mod function;
pub mod gateway;
pub mod mail;
pub mod migrations;
pub mod realtime;
pub mod storage;
pub mod store;

pub use db::Database;
pub use function::{ExecutionResult, FunctionExecutor, FunctionRegistry, FunctionRouter, RouteResult};
pub use gateway::{
    AuthConfig, AuthMiddleware, GatewayConfig, GatewayServer, RpcError, RpcHandler, RpcRequest,
    RpcResponse,
};
pub use mail::WebhookMailer;
pub use migrations::{builtin_migrations, Migration, MigrationRunner, MigrationStatus};
pub use realtime::ChangeListener;
pub use storage::LocalObjectStore;
pub use store::PgStore;
