use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use quickdesk_core::{AuthContext, RequestMetadata};
use uuid::Uuid;

pub const TRACE_ID_HEADER: &str = "x-trace-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request identifiers, stored in request extensions.
#[derive(Debug, Clone)]
pub struct TracingState {
    pub trace_id: String,
    pub request_id: Uuid,
    pub start_time: std::time::Instant,
}

impl TracingState {
    pub fn new() -> Self {
        Self::with_trace_id(Uuid::new_v4().to_string())
    }

    /// Continue a trace started by the caller.
    pub fn with_trace_id(trace_id: String) -> Self {
        Self {
            trace_id,
            request_id: Uuid::new_v4(),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Metadata handed to desk functions.
    pub fn metadata(&self, client_ip: Option<String>, user_agent: Option<String>) -> RequestMetadata {
        RequestMetadata {
            request_id: self.request_id,
            trace_id: self.trace_id.clone(),
            client_ip,
            user_agent,
            timestamp: chrono::Utc::now(),
        }
    }
}

impl Default for TracingState {
    fn default() -> Self {
        Self::new()
    }
}

/// Attach a [`TracingState`] and echo the ids on the response.
pub async fn tracing_middleware(mut req: Request, next: Next) -> Response {
    let trace_id = req
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let state = TracingState::with_trace_id(trace_id);
    req.extensions_mut().insert(state.clone());
    if req.extensions().get::<AuthContext>().is_none() {
        req.extensions_mut().insert(AuthContext::unauthenticated());
    }

    let mut response = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&state.trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, val);
    }
    if let Ok(val) = HeaderValue::from_str(&state.request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, val);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_state_with_trace_id() {
        let state = TracingState::with_trace_id("trace-123".to_string());
        assert_eq!(state.trace_id, "trace-123");
        assert_ne!(state.request_id, TracingState::new().request_id);
    }

    #[test]
    fn test_metadata_carries_ids() {
        let state = TracingState::with_trace_id("trace-9".to_string());
        let meta = state.metadata(Some("10.0.0.1".into()), None);
        assert_eq!(meta.trace_id, "trace-9");
        assert_eq!(meta.request_id, state.request_id);
        assert_eq!(meta.client_ip.as_deref(), Some("10.0.0.1"));
    }
}
