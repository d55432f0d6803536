use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use quickdesk_core::DeskError;
use serde::{Deserialize, Serialize};

/// Envelope returned by every RPC and upload call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Whether the call succeeded.
    pub success: bool,
    /// Function result on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Failure details when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    /// Echo of the `x-request-id` assigned to the call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl RpcResponse {
    /// Successful response carrying `data`.
    pub fn success(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            request_id: None,
        }
    }

    /// Failed response.
    pub fn error(error: RpcError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            request_id: None,
        }
    }

    /// Attach the request id for tracing.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

impl IntoResponse for RpcResponse {
    fn into_response(self) -> Response {
        let status = if self.success {
            StatusCode::OK
        } else {
            self.error
                .as_ref()
                .map(|e| e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        };

        (status, Json(self)).into_response()
    }
}

/// Error body of a failed call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    /// Machine-readable code such as `FORBIDDEN` or `NOT_FOUND`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Extra data, e.g. `redirect_to` for access denials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl RpcError {
    /// Error with no details.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Error carrying a details object.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details),
        }
    }

    /// HTTP status for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self.code.as_str() {
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "VALIDATION_ERROR" | "INVALID_ARGUMENT" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "TIMEOUT" => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// `NOT_FOUND` error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    /// `UNAUTHORIZED` error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    /// `FORBIDDEN` error without a redirect.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    /// `VALIDATION_ERROR` error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// `CONFLICT` error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    /// `INTERNAL_ERROR` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl From<DeskError> for RpcError {
    fn from(err: DeskError) -> Self {
        match err {
            DeskError::NotFound(msg) => Self::not_found(msg),
            DeskError::Unauthorized(msg) => Self::unauthorized(msg),
            DeskError::Forbidden {
                message,
                redirect_to: Some(target),
            } => Self::with_details(
                "FORBIDDEN",
                message,
                serde_json::json!({ "redirect_to": target }),
            ),
            DeskError::Forbidden { message, .. } => Self::forbidden(message),
            DeskError::Validation(msg) => Self::validation(msg),
            DeskError::InvalidArgument(msg) => Self::new("INVALID_ARGUMENT", msg),
            DeskError::Conflict(msg) => Self::conflict(msg),
            DeskError::Timeout(msg) => Self::new("TIMEOUT", msg),
            // Storage and database details stay in the logs.
            DeskError::Sql(_) | DeskError::Database(_) => {
                Self::internal("Something went wrong. Please try again.")
            }
            DeskError::Storage(_) => Self::internal("Storage is unavailable. Please try again."),
            other => Self::internal(other.to_string()),
        }
    }
}
