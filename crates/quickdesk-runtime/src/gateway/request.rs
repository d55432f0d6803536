use serde::{Deserialize, Serialize};

/// Body of `POST /rpc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub function: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

impl RpcRequest {
    pub fn new(function: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            function: function.into(),
            args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_request_deserialization() {
        let json = r#"{"function": "get_ticket", "args": {"ticket_id": "8f14e45f-ea5b-4d3b-9a43-2c7c6f0b7e11"}}"#;
        let req: RpcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.function, "get_ticket");
        assert_eq!(req.args["ticket_id"], "8f14e45f-ea5b-4d3b-9a43-2c7c6f0b7e11");
    }

    #[test]
    fn test_rpc_request_default_args() {
        let req: RpcRequest = serde_json::from_str(r#"{"function": "dashboard"}"#).unwrap();
        assert!(req.args.is_null());
    }
}
