//! Wire-level error conversions. The skill/store/worker layers only ever
//! produce [`GatewayError`]; every endpoint adapter maps it to its own wire
//! shape here rather than growing a parallel error type.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pg_core::error::{ErrorKind, GatewayError, GatewayErrorDto};
use serde::Serialize;
use serde_json::{json, Value};

/// REST/MCP/chat error wrapper. Mirrors the teacher's `ApiError`: a status
/// code plus a body, `IntoResponse`-able directly from a handler's `Result`.
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let dto = GatewayErrorDto::from(&self.0);
        (status, Json(json!({ "error": dto }))).into_response()
    }
}

/// A JSON-RPC 2.0 error object, per the A2A endpoint's `{code, message,
/// data?}` shape.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    /// One of the fixed codes in §7: -32600/-32601/-32602/-32001/-32002/-32603.
    pub code: i64,
    /// Human-readable message. For `InvalidTransition` this always contains
    /// the literal "Invalid status transition" substring relied on by
    /// clients matching S4.
    pub message: String,
    /// Structured context, omitted when empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// -32600: malformed JSON-RPC envelope (not a [`GatewayError`] case, raised
/// directly by the A2A dispatcher before a skill ever runs).
pub const JSON_RPC_INVALID_REQUEST: i64 = -32600;
/// -32601: unknown `method`.
pub const JSON_RPC_METHOD_NOT_FOUND: i64 = -32601;

impl From<&GatewayError> for JsonRpcError {
    fn from(err: &GatewayError) -> Self {
        let message = if err.kind == ErrorKind::InvalidTransition {
            format!("Invalid status transition: {}", err.message)
        } else {
            err.message.clone()
        };
        let data = if err.context.is_empty() { None } else { serde_json::to_value(&err.context).ok() };
        Self { code: err.kind.json_rpc_code(), message, data }
    }
}

/// Build a full JSON-RPC 2.0 error envelope body for the given request id.
pub fn json_rpc_error_body(id: Value, error: JsonRpcError) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": error })
}

/// Build a full JSON-RPC 2.0 success envelope body.
pub fn json_rpc_result_body(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}
