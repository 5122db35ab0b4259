//! `POST /mcp`: the Model Context Protocol tool surface, gated the same
//! way as A2A but on `tools/call` only. Grounded on the teacher's single
//! JSON-in/JSON-out route shape (`cmd_run` in `abp-daemon`), generalized
//! from one backend invocation to a small JSON-RPC-flavored method set.

use crate::error::{json_rpc_error_body, json_rpc_result_body, JsonRpcError, JSON_RPC_METHOD_NOT_FOUND};
use crate::payment_gate::{self, GateOutcome};
use crate::skill_dispatch;
use crate::state::AppState;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use pg_core::error::GatewayError;
use pg_router::tool_catalog;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct McpRequest {
    #[serde(default)]
    id: Value,
    method: Option<String>,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Map<String, Value>,
}

/// `POST /mcp`. `initialize` and `tools/list` are never gated;
/// `tools/call` is gated unless the called tool is a free skill.
pub async fn handle(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(raw): Json<Value>) -> Response {
    let request: McpRequest = match serde_json::from_value(raw) {
        Ok(r) => r,
        Err(_) => return rpc_error(Value::Null, &GatewayError::invalid_argument("malformed MCP request")),
    };
    let Some(method) = request.method else {
        return rpc_error(request.id, &GatewayError::invalid_argument("missing method"));
    };

    match method.as_str() {
        "initialize" => (StatusCode::OK, Json(json_rpc_result_body(request.id, initialize_result()))).into_response(),
        "tools/list" => (StatusCode::OK, Json(json_rpc_result_body(request.id, tools_list_result()))).into_response(),
        "tools/call" => tools_call(&state, &headers, request.id, request.params).await,
        other => (StatusCode::OK, Json(json_rpc_error_body(request.id, JsonRpcError {
            code: JSON_RPC_METHOD_NOT_FOUND,
            message: format!("unknown method: {other}"),
            data: None,
        })))
            .into_response(),
    }
}

/// GET/DELETE are not supported by this transport; the spec's MCP surface
/// is a single stateless POST route.
pub async fn method_not_allowed() -> StatusCode {
    StatusCode::METHOD_NOT_ALLOWED
}

fn rpc_error(id: Value, err: &GatewayError) -> Response {
    (StatusCode::OK, Json(json_rpc_error_body(id, JsonRpcError::from(err)))).into_response()
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": "2024-11-05",
        "serverInfo": {"name": "proofport-gateway", "version": env!("CARGO_PKG_VERSION")},
        "capabilities": {"tools": {}},
    })
}

fn tools_list_result() -> Value {
    let tools: Vec<Value> = tool_catalog()
        .into_iter()
        .map(|t| json!({"name": t.name, "description": t.description, "inputSchema": t.parameters}))
        .collect();
    json!({ "tools": tools })
}

async fn tools_call(state: &AppState, headers: &HeaderMap, id: Value, params: Value) -> Response {
    let params: ToolCallParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(_) => return rpc_error(id, &GatewayError::invalid_argument("missing required param: name")),
    };

    let requires_payment = !payment_gate::is_free_skill(&params.name);
    let header = payment_gate::extract_payment_header(|name| headers.get(name).and_then(|v| v.to_str().ok()));
    let resource_url = format!("{}/mcp", state.base_url().trim_end_matches('/'));
    let outcome = match payment_gate::check(state, requires_payment, &resource_url, "Call a gated proof-serving tool", header).await {
        Ok(outcome) => outcome,
        Err(err) => return rpc_error(id, &err),
    };
    if let GateOutcome::Required(requirements) = outcome {
        return payment_required_response(&requirements);
    }

    match skill_dispatch::dispatch(&state.deps, &params.name, &params.arguments).await {
        Ok(result) => (StatusCode::OK, Json(json_rpc_result_body(id, json!({
            "content": [{"type": "text", "text": serde_json::to_string(&result).unwrap_or_default()}],
            "isError": false,
        }))))
            .into_response(),
        Err(err) => (StatusCode::OK, Json(json_rpc_result_body(id, json!({
            "content": [{"type": "text", "text": err.message}],
            "isError": true,
        }))))
            .into_response(),
    }
}

fn payment_required_response(requirements: &pg_payment::types::PaymentRequirements) -> Response {
    let body = serde_json::to_string(requirements).unwrap_or_default();
    let header_value = axum::http::HeaderValue::from_str(&body).unwrap_or(axum::http::HeaderValue::from_static("{}"));
    let mut resp = (StatusCode::PAYMENT_REQUIRED, Json(json!({"error": "payment required", "accepts": requirements}))).into_response();
    resp.headers_mut().insert(payment_gate::PAYMENT_REQUIRED_HEADER, header_value);
    resp
}
