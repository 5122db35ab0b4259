//! `POST /a2a`: a single JSON-RPC 2.0 dispatcher for `message/send`,
//! `message/stream`, `tasks/get`, `tasks/cancel`, `tasks/resubscribe`.
//! Grounded on the teacher's single-route-per-concern shape in
//! `abp-daemon::build_app`, generalized from one handler per REST verb to
//! one handler per JSON-RPC method behind a shared envelope.

use crate::error::{json_rpc_error_body, json_rpc_result_body, JsonRpcError, JSON_RPC_INVALID_REQUEST, JSON_RPC_METHOD_NOT_FOUND};
use crate::payment_gate::{self, GateOutcome};
use crate::state::AppState;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use pg_core::error::GatewayError;
use pg_core::message::Message;
use pg_core::task::{Task, TaskState};
use pg_events::TaskEvent;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::Stream;

const MESSAGE_SEND_DEADLINE: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    jsonrpc: Option<String>,
    #[serde(default)]
    id: Value,
    method: Option<String>,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Deserialize)]
struct MessageParams {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct TaskIdParams {
    id: String,
    #[serde(rename = "historyLength")]
    history_length: Option<usize>,
}

/// `POST /a2a`. Never returns an HTTP error for a well-formed JSON-RPC
/// envelope whose method fails; the failure rides inside the `error` field
/// of a 200 response, except for `message/send`'s payment gate, which is a
/// genuine HTTP 402 (the caller hasn't gotten a task yet to poll).
pub async fn dispatch(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(raw): Json<Value>) -> Response {
    let request: JsonRpcRequest = match serde_json::from_value(raw) {
        Ok(r) => r,
        Err(_) => return invalid_request(Value::Null),
    };

    if request.jsonrpc.as_deref() != Some("2.0") {
        return invalid_request(request.id);
    }
    let Some(method) = request.method.filter(|m| !m.is_empty()) else {
        return invalid_request(request.id);
    };

    match method.as_str() {
        "message/send" => message_send(&state, &headers, request.id, request.params).await,
        "message/stream" => message_stream(&state, &headers, request.id, request.params).await,
        "tasks/get" => tasks_get(&state, request.id, request.params).await,
        "tasks/cancel" => tasks_cancel(&state, request.id, request.params).await,
        "tasks/resubscribe" => tasks_resubscribe(&state, request.id, request.params).await,
        _ => (StatusCode::OK, Json(json_rpc_error_body(request.id, JsonRpcError {
            code: JSON_RPC_METHOD_NOT_FOUND,
            message: format!("unknown method: {method}"),
            data: None,
        })))
            .into_response(),
    }
}

fn invalid_request(id: Value) -> Response {
    (StatusCode::OK, Json(json_rpc_error_body(id, JsonRpcError {
        code: JSON_RPC_INVALID_REQUEST,
        message: "malformed JSON-RPC request".to_string(),
        data: None,
    })))
        .into_response()
}

fn rpc_error(id: Value, err: &GatewayError) -> Response {
    (StatusCode::OK, Json(json_rpc_error_body(id, JsonRpcError::from(err)))).into_response()
}

fn invalid_message(id: Value) -> Response {
    rpc_error(id, &GatewayError::invalid_argument("message must have a role and at least one part"))
}

/// Extract and validate `message` out of `params`, rejecting an empty part
/// list per §4.10's wire-level envelope validation.
fn parse_message(params: Value) -> Result<Message, GatewayError> {
    let params: MessageParams = serde_json::from_value(params)
        .map_err(|_| GatewayError::invalid_argument("message must have a role and at least one part"))?;
    if params.message.parts.is_empty() {
        return Err(GatewayError::invalid_argument("message must have a role and at least one part"));
    }
    Ok(params.message)
}

async fn resolve_and_gate(
    state: &AppState,
    headers: &HeaderMap,
    message: &Message,
) -> Result<(pg_router::ResolvedSkill, Option<pg_payment::types::PaymentPayload>), GatewayResult> {
    let mut resolved = pg_router::resolve_skill(message, state.deps.llm.as_deref())
        .await
        .map_err(GatewayResult::Rpc)?;

    if let Some(ctx) = &message.context_id {
        if let Ok(Some(request_id)) = state.tasks.get_context_request(ctx).await {
            pg_router::override_request_id(&mut resolved, Some(&request_id));
        }
    }

    let requires_payment = !payment_gate::is_free_skill(&resolved.skill);
    let header = payment_gate::extract_payment_header(|name| headers.get(name).and_then(|v| v.to_str().ok()));
    let resource_url = format!("{}/a2a", state.base_url().trim_end_matches('/'));
    let outcome = payment_gate::check(state, requires_payment, &resource_url, "Invoke a gated proof-serving skill", header)
        .await
        .map_err(GatewayResult::Rpc)?;

    match outcome {
        GateOutcome::Allowed => {
            let payload = header.and_then(|h| pg_payment::types::PaymentPayload::from_base64(h).ok());
            Ok((resolved, payload))
        }
        GateOutcome::Required(requirements) => Err(GatewayResult::PaymentRequired(requirements)),
    }
}

/// Internal short-circuit used only by `resolve_and_gate`; never escapes
/// this module.
enum GatewayResult {
    Rpc(GatewayError),
    PaymentRequired(Box<pg_payment::types::PaymentRequirements>),
}

async fn message_send(state: &AppState, headers: &HeaderMap, id: Value, params: Value) -> Response {
    let message = match parse_message(params) {
        Ok(m) => m,
        Err(_) => return invalid_message(id),
    };

    let (resolved, payment) = match resolve_and_gate(state, headers, &message).await {
        Ok(pair) => pair,
        Err(GatewayResult::Rpc(err)) => return rpc_error(id, &err),
        Err(GatewayResult::PaymentRequired(requirements)) => return payment_required_response(&requirements),
    };

    let task = match state.tasks.create_task(resolved.skill, resolved.params.into_iter().collect(), message.clone(), message.context_id.clone()).await {
        Ok(t) => t,
        Err(err) => return rpc_error(id, &err),
    };

    if let Some(payload) = payment {
        if let Err(err) = payment_gate::record_pending(state, &task.id, &payload, None).await {
            tracing::warn!(task_id = %task.id, error = %err, "failed to record pending payment");
        }
    }

    let mut sub = state.events.subscribe(&task.id).await;
    let task_id = task.id.clone();
    let result = tokio::time::timeout(MESSAGE_SEND_DEADLINE, async {
        loop {
            match sub.recv().await {
                Some(TaskEvent::TaskComplete { task }) => return task,
                Some(_) => continue,
                None => break,
            }
        }
        state.tasks.get_task(&task_id).await.unwrap_or_else(|_| stub_task(&task_id))
    })
    .await;

    let final_task = match result {
        Ok(task) => task,
        Err(_) => state.tasks.get_task(&task_id).await.unwrap_or_else(|_| stub_task(&task_id)),
    };

    (StatusCode::OK, Json(json_rpc_result_body(id, serde_json::to_value(&final_task).unwrap_or(Value::Null)))).into_response()
}

fn stub_task(task_id: &str) -> Task {
    let mut task = Task::new_queued("unknown", Default::default(), Message::user(vec![]), None);
    task.id = task_id.to_string();
    task
}

fn payment_required_response(requirements: &pg_payment::types::PaymentRequirements) -> Response {
    let body = serde_json::to_string(requirements).unwrap_or_default();
    let header_value = axum::http::HeaderValue::from_str(&body).unwrap_or(axum::http::HeaderValue::from_static("{}"));
    let mut resp = (StatusCode::PAYMENT_REQUIRED, Json(json!({"error": "payment required", "accepts": requirements}))).into_response();
    resp.headers_mut().insert(payment_gate::PAYMENT_REQUIRED_HEADER, header_value);
    resp
}

async fn message_stream(state: &AppState, headers: &HeaderMap, id: Value, params: Value) -> Response {
    let message = match parse_message(params) {
        Ok(m) => m,
        Err(_) => return invalid_message(id),
    };

    let (resolved, payment) = match resolve_and_gate(state, headers, &message).await {
        Ok(pair) => pair,
        Err(GatewayResult::Rpc(err)) => return rpc_error(id, &err),
        Err(GatewayResult::PaymentRequired(requirements)) => return payment_required_response(&requirements),
    };

    let task = match state.tasks.create_task(resolved.skill, resolved.params.into_iter().collect(), message.clone(), message.context_id.clone()).await {
        Ok(t) => t,
        Err(err) => return rpc_error(id, &err),
    };

    if let Some(payload) = payment {
        if let Err(err) = payment_gate::record_pending(state, &task.id, &payload, None).await {
            tracing::warn!(task_id = %task.id, error = %err, "failed to record pending payment");
        }
    }

    // Subscribe before returning the stream to the client: the task is
    // already enqueued and the worker may run arbitrarily soon, so this is
    // still subject to the bus's "late subscribers miss past events" gap if
    // the worker somehow runs between create and subscribe. Kept minimal by
    // subscribing in the same async step, no await in between.
    let sub = state.events.subscribe(&task.id).await;
    let stream = event_stream(sub);
    Sse::new(stream).into_response()
}

/// `None` state means the stream already emitted its final event (or the
/// bus closed) and is done; `Some(sub)` carries the live subscription.
fn event_stream(sub: pg_events::TaskEventSubscription) -> impl Stream<Item = Result<SseEvent, Infallible>> {
    futures::stream::unfold(Some(sub), |state| async move {
        let mut sub = state?;
        match sub.recv().await {
            Some(event) => {
                let is_final = event.is_terminal();
                let data = serde_json::to_string(&event).unwrap_or_default();
                let next = if is_final { None } else { Some(sub) };
                Some((Ok(SseEvent::default().data(data)), next))
            }
            None => None,
        }
    })
}

async fn tasks_get(state: &AppState, id: Value, params: Value) -> Response {
    let params: TaskIdParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(_) => return rpc_error(id, &GatewayError::invalid_argument("missing required param: id")),
    };
    let task = match state.tasks.get_task(&params.id).await {
        Ok(t) => t,
        Err(err) => return rpc_error(id, &err),
    };
    let task = match params.history_length {
        Some(n) => task.with_history_length(n),
        None => task,
    };
    (StatusCode::OK, Json(json_rpc_result_body(id, serde_json::to_value(&task).unwrap_or(Value::Null)))).into_response()
}

async fn tasks_cancel(state: &AppState, id: Value, params: Value) -> Response {
    let params: TaskIdParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(_) => return rpc_error(id, &GatewayError::invalid_argument("missing required param: id")),
    };
    match state.tasks.update_task_status(&params.id, TaskState::Canceled, None).await {
        Ok(task) => {
            state.events.publish(&task.id, TaskEvent::StatusUpdate { state: TaskState::Canceled, message: None, is_final: true }).await;
            (StatusCode::OK, Json(json_rpc_result_body(id, serde_json::to_value(&task).unwrap_or(Value::Null)))).into_response()
        }
        Err(err) => rpc_error(id, &err),
    }
}

async fn tasks_resubscribe(state: &AppState, id: Value, params: Value) -> Response {
    let params: TaskIdParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(_) => return rpc_error(id, &GatewayError::invalid_argument("missing required param: id")),
    };
    let task = match state.tasks.get_task(&params.id).await {
        Ok(t) => t,
        Err(err) => return rpc_error(id, &err),
    };
    if task.status.state.is_terminal() {
        return (StatusCode::OK, Json(json_rpc_result_body(id, serde_json::to_value(&task).unwrap_or(Value::Null)))).into_response();
    }
    let sub = state.events.subscribe(&task.id).await;
    Sse::new(event_stream(sub)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::middleware::{CorsConfig, RateLimiter as HttpRateLimiter};
    use crate::providers::MockProver;
    use clap::Parser;
    use pg_events::EventBus;
    use pg_kv::InMemoryKvStore;
    use pg_skills::{PaymentMode, SkillDeps, TeeMode};
    use pg_store::{FlowStore, PaymentStore, ProofStore, SessionStore, TaskStore};

    fn state() -> Arc<AppState> {
        let config = Config::parse_from(["proofport-gateway"]);
        let kv: Arc<dyn pg_kv::KvStore> = Arc::new(InMemoryKvStore::new());
        let deps = SkillDeps {
            sessions: SessionStore::new(kv.clone()),
            payments: PaymentStore::new(kv.clone()),
            proofs: ProofStore::new(kv.clone()),
            tasks: TaskStore::new(kv.clone()),
            sign_page_base_url: "http://localhost:3000".to_string(),
            signing_ttl: Duration::from_secs(300),
            payment_mode: PaymentMode::Disabled,
            payment_price: "100000".to_string(),
            payment_network: "base-sepolia".to_string(),
            payment_currency: "USDC".to_string(),
            tee_mode: TeeMode::Disabled,
            tee_attestation_enabled: false,
            prover: Arc::new(MockProver),
            tee: None,
            llm: None,
            reputation: None,
            rate_limiter: None,
            proof_cache: None,
            chain_verifier: None,
        };
        Arc::new(AppState {
            deps,
            kv: kv.clone(),
            tasks: TaskStore::new(kv.clone()),
            flows: FlowStore::new(kv),
            events: Arc::new(EventBus::new()),
            facilitator: None,
            http_rate_limiter: HttpRateLimiter::new(1000, Duration::from_secs(1)),
            cors: CorsConfig::from_origins(vec!["*".to_string()]),
            config,
        })
    }

    fn data_message(skill: &str, extra: Value) -> Value {
        let mut obj = extra.as_object().cloned().unwrap_or_default();
        obj.insert("skill".to_string(), Value::String(skill.to_string()));
        json!({
            "message": {
                "role": "user",
                "parts": [{"kind": "data", "mimeType": "application/json", "data": obj}],
            }
        })
    }

    #[tokio::test]
    async fn unknown_method_maps_to_method_not_found() {
        let resp = dispatch(State(state()), HeaderMap::new(), Json(json!({"jsonrpc": "2.0", "id": 9, "method": "no/such"}))).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn wrong_jsonrpc_version_is_invalid_request() {
        let resp = dispatch(State(state()), HeaderMap::new(), Json(json!({"jsonrpc": "1.0", "id": 1, "method": "tasks/get"}))).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn message_send_with_free_skill_completes_and_returns_a_terminal_task() {
        let state = state();
        let worker_state = state.clone();
        let worker_task = tokio::spawn(async move {
            let worker = pg_worker::Worker::new(
                worker_state.tasks.clone(),
                worker_state.events.clone(),
                worker_state.deps.clone(),
                Duration::from_millis(5),
            );
            worker.run().await
        });

        let params = data_message("get_supported_circuits", json!({}));
        let resp = message_send(&state, &HeaderMap::new(), json!(1), params).await;
        worker_task.abort();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["result"]["status"]["state"], "completed");
    }

    #[tokio::test]
    async fn tasks_get_unknown_id_maps_to_not_found_rpc_error() {
        let state = state();
        let resp = tasks_get(&state, json!(2), json!({"id": "nope"})).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn tasks_cancel_on_completed_task_surfaces_invalid_transition() {
        let state = state();
        let task = state.tasks.create_task("get_supported_circuits", Default::default(), Message::user(vec![pg_core::message::Part::text("hi")]), None).await.unwrap();
        state.tasks.update_task_status(&task.id, TaskState::Running, None).await.unwrap();
        state.tasks.update_task_status(&task.id, TaskState::Completed, None).await.unwrap();

        let resp = tasks_cancel(&state, json!(3), json!({"id": task.id})).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["code"], -32002);
        assert!(value["error"]["message"].as_str().unwrap().contains("Invalid status transition"));
    }

    #[tokio::test]
    async fn invalid_message_shape_is_rejected_before_routing() {
        let state = state();
        let resp = message_send(&state, &HeaderMap::new(), json!(4), json!({"message": {"role": "user", "parts": []}})).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn message_stream_with_free_skill_returns_an_sse_response() {
        let state = state();
        let params = data_message("get_supported_circuits", json!({}));
        let resp = message_stream(&state, &HeaderMap::new(), json!(5), params).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("content-type").unwrap(), "text/event-stream");
    }

    #[tokio::test]
    async fn message_stream_rejects_an_invalid_message_shape() {
        let state = state();
        let resp = message_stream(&state, &HeaderMap::new(), json!(6), json!({"message": {"role": "user", "parts": []}})).await;
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn tasks_resubscribe_on_a_terminal_task_replays_it_directly_not_as_sse() {
        let state = state();
        let task = state.tasks.create_task("get_supported_circuits", Default::default(), Message::user(vec![pg_core::message::Part::text("hi")]), None).await.unwrap();
        state.tasks.update_task_status(&task.id, TaskState::Running, None).await.unwrap();
        state.tasks.update_task_status(&task.id, TaskState::Completed, None).await.unwrap();

        let resp = tasks_resubscribe(&state, json!(7), json!({"id": task.id})).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["result"]["status"]["state"], "completed");
    }

    #[tokio::test]
    async fn tasks_resubscribe_on_a_running_task_returns_an_sse_response() {
        let state = state();
        let task = state.tasks.create_task("get_supported_circuits", Default::default(), Message::user(vec![pg_core::message::Part::text("hi")]), None).await.unwrap();
        state.tasks.update_task_status(&task.id, TaskState::Running, None).await.unwrap();

        let resp = tasks_resubscribe(&state, json!(8), json!({"id": task.id})).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("content-type").unwrap(), "text/event-stream");
    }

    #[tokio::test]
    async fn tasks_resubscribe_unknown_id_maps_to_not_found_rpc_error() {
        let state = state();
        let resp = tasks_resubscribe(&state, json!(9), json!({"id": "nope"})).await;
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["code"], -32001);
    }
}
