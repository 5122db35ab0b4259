//! `POST /v1/chat/completions`, `GET /v1/models`: an OpenAI-compatible
//! surface over the same skill layer, routed through the canonical
//! text-based router rather than a bespoke tool-calling protocol.
//! Grounded on the teacher's single-shot `cmd_run` handler, generalized
//! into a bounded multi-round loop since a chat turn may need more than
//! one skill call to reach a useful answer.

use crate::payment_gate::{self, GateOutcome};
use crate::skill_dispatch;
use crate::state::AppState;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use pg_core::error::GatewayError;
use pg_core::message::{Message, Part};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;

const MODEL_NAME: &str = "proofport-gateway";
const MAX_TOOL_ROUNDS: usize = 3;

#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ToolRound {
    skill: String,
    result: Value,
}

struct LoopOutcome {
    reply: String,
    rounds: Vec<ToolRound>,
    refused: Option<String>,
}

pub async fn completions(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(request): Json<ChatCompletionRequest>) -> Response {
    let transcript = render_transcript(&request.messages);
    let outcome = match run_tool_loop(&state, &headers, transcript).await {
        Ok(outcome) => outcome,
        Err(ChatError::Gateway(err)) => return crate::error::ApiError(err).into_response(),
        Err(ChatError::PaymentRequired(requirements)) => return payment_required_response(&requirements),
    };

    if request.stream {
        streamed_response(outcome)
    } else {
        (StatusCode::OK, Json(completion_body(&outcome))).into_response()
    }
}

pub async fn models() -> Json<Value> {
    Json(json!({
        "object": "list",
        "data": [{"id": MODEL_NAME, "object": "model", "owned_by": "proofport"}],
    }))
}

fn render_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .filter(|m| m.role != "system")
        .map(|m| m.content.clone())
        .collect::<Vec<_>>()
        .join("\n")
}

enum ChatError {
    Gateway(GatewayError),
    PaymentRequired(Box<pg_payment::types::PaymentRequirements>),
}

async fn run_tool_loop(state: &AppState, headers: &HeaderMap, transcript: String) -> Result<LoopOutcome, ChatError> {
    let mut transcript = transcript;
    let mut rounds = Vec::new();
    let mut last_skill: Option<String> = None;
    let mut proof_calls = 0;
    let mut refused = None;

    for _ in 0..MAX_TOOL_ROUNDS {
        let message = Message::user(vec![Part::text(transcript.clone())]);
        let resolved = match pg_router::resolve_skill(&message, state.deps.llm.as_deref()).await {
            Ok(r) => r,
            Err(err) => return Err(ChatError::Gateway(err)),
        };

        let is_proof_op = matches!(resolved.skill.as_str(), "generate_proof" | "verify_proof");

        // A second attempt at a proof op is refused outright, even if the
        // first attempt failed — checked ahead of the plain convergence
        // guard below, which would otherwise also catch a repeated proof
        // skill but with a less specific message.
        if is_proof_op && proof_calls >= 1 {
            refused = Some(format!("only one {} call is allowed per request", resolved.skill));
            break;
        }

        if !is_proof_op && last_skill.as_deref() == Some(resolved.skill.as_str()) {
            break;
        }

        if is_proof_op {
            proof_calls += 1;
        }

        let requires_payment = !payment_gate::is_free_skill(&resolved.skill);
        let header = payment_gate::extract_payment_header(|name| headers.get(name).and_then(|v| v.to_str().ok()));
        let resource_url = format!("{}/v1/chat/completions", state.base_url().trim_end_matches('/'));
        match payment_gate::check(state, requires_payment, &resource_url, "Invoke a proof-serving tool via chat", header)
            .await
            .map_err(ChatError::Gateway)?
        {
            GateOutcome::Allowed => {}
            GateOutcome::Required(requirements) => return Err(ChatError::PaymentRequired(requirements)),
        }

        match skill_dispatch::dispatch(&state.deps, &resolved.skill, &resolved.params).await {
            Ok(result) => {
                transcript.push_str(&format!("\n[{} result] {}\n", resolved.skill, result));
                last_skill = Some(resolved.skill.clone());
                rounds.push(ToolRound { skill: resolved.skill, result });
                // A successful proof op is terminal; an ordinary skill
                // keeps the loop going so a chain of free-skill calls can
                // converge on its own via the guard above.
                if is_proof_op {
                    break;
                }
            }
            Err(err) => {
                transcript.push_str(&format!("\n[{} failed] {}\n", resolved.skill, err.message));
                last_skill = Some(resolved.skill);
                // A failed ordinary skill stops the loop; a failed proof
                // op keeps it open only so a repeat attempt can be caught
                // and refused above, rather than silently retried.
                if !is_proof_op {
                    break;
                }
            }
        }
    }

    let reply = summarize(&rounds, refused.as_deref());
    Ok(LoopOutcome { reply, rounds, refused })
}

fn summarize(rounds: &[ToolRound], refused: Option<&str>) -> String {
    if let Some(reason) = refused {
        return reason.to_string();
    }
    match rounds.last() {
        Some(round) => format!("Called {} and got: {}", round.skill, round.result),
        None => "No routable tool call was found in this request.".to_string(),
    }
}

fn completion_body(outcome: &LoopOutcome) -> Value {
    let mut body = json!({
        "id": format!("chatcmpl-{}", uuid::Uuid::new_v4()),
        "object": "chat.completion",
        "created": chrono::Utc::now().timestamp(),
        "model": MODEL_NAME,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": outcome.reply},
            "finish_reason": "stop",
        }],
    });
    if let Some(last) = outcome.rounds.last() {
        body["x_proofport_result"] = json!({"skill": last.skill, "result": last.result});
    }
    body
}

fn streamed_response(outcome: LoopOutcome) -> Response {
    let id = format!("chatcmpl-{}", uuid::Uuid::new_v4());
    let created = chrono::Utc::now().timestamp();
    let tokens: Vec<String> = outcome.reply.split_whitespace().map(|t| format!("{t} ")).collect();
    let last_round = outcome.rounds.last().map(|r| json!({"skill": r.skill, "result": r.result}));

    let stream = futures::stream::unfold((0usize, tokens, last_round, id, created, false), move |(i, tokens, last_round, id, created, done)| async move {
        if done {
            return None;
        }
        if i < tokens.len() {
            let chunk = json!({
                "id": id,
                "object": "chat.completion.chunk",
                "created": created,
                "model": MODEL_NAME,
                "choices": [{"index": 0, "delta": {"content": tokens[i]}, "finish_reason": null}],
            });
            let event = SseEvent::default().data(chunk.to_string());
            return Some((Ok::<_, Infallible>(event), (i + 1, tokens, last_round, id, created, false)));
        }

        let mut final_chunk = json!({
            "id": id,
            "object": "chat.completion.chunk",
            "created": created,
            "model": MODEL_NAME,
            "choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}],
        });
        if let Some(result) = &last_round {
            final_chunk["x_proofport_result"] = result.clone();
        }
        let event = SseEvent::default().data(final_chunk.to_string());
        Some((Ok(event), (i, tokens, last_round, id, created, true)))
    });

    Sse::new(Box::pin(stream) as std::pin::Pin<Box<dyn tokio_stream::Stream<Item = Result<SseEvent, Infallible>> + Send>>).into_response()
}

fn payment_required_response(requirements: &pg_payment::types::PaymentRequirements) -> Response {
    let body = serde_json::to_string(requirements).unwrap_or_default();
    let header_value = axum::http::HeaderValue::from_str(&body).unwrap_or(axum::http::HeaderValue::from_static("{}"));
    let mut resp = (StatusCode::PAYMENT_REQUIRED, Json(json!({"error": "payment required", "accepts": requirements}))).into_response();
    resp.headers_mut().insert(payment_gate::PAYMENT_REQUIRED_HEADER, header_value);
    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::middleware::{CorsConfig, RateLimiter as HttpRateLimiter};
    use crate::providers::MockProver;
    use async_trait::async_trait;
    use clap::Parser;
    use pg_events::EventBus;
    use pg_kv::InMemoryKvStore;
    use pg_skills::{PaymentMode, SkillDeps, TeeMode, ToolCall, ToolSpec};
    use pg_store::{FlowStore, PaymentStore, ProofStore, SessionStore, TaskStore};
    use std::time::Duration;

    struct StubLLM(ToolCall);

    #[async_trait]
    impl pg_skills::LLMProvider for StubLLM {
        async fn resolve_tool_call(&self, _system_prompt: &str, _user_text: &str, _tools: &[ToolSpec]) -> Result<ToolCall, GatewayError> {
            Ok(self.0.clone())
        }
    }

    fn state(llm: Option<Arc<dyn pg_skills::LLMProvider>>) -> Arc<AppState> {
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
            llm,
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

    #[tokio::test]
    async fn models_lists_the_single_virtual_model() {
        let Json(body) = models().await;
        assert_eq!(body["data"][0]["id"], MODEL_NAME);
    }

    #[tokio::test]
    async fn text_with_no_llm_configured_is_not_routable() {
        let state = state(None);
        let request = ChatCompletionRequest { messages: vec![ChatMessage { role: "user".to_string(), content: "hello there".to_string() }], stream: false };
        let resp = completions(State(state), HeaderMap::new(), Json(request)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn llm_routed_free_skill_completes_with_a_vendor_result() {
        let llm: Arc<dyn pg_skills::LLMProvider> = Arc::new(StubLLM(ToolCall { name: "get_supported_circuits".to_string(), arguments: json!({}) }));
        let state = state(Some(llm));
        let request = ChatCompletionRequest { messages: vec![ChatMessage { role: "user".to_string(), content: "what circuits do you support?".to_string() }], stream: false };
        let resp = completions(State(state), HeaderMap::new(), Json(request)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["x_proofport_result"]["skill"], "get_supported_circuits");
    }

    #[tokio::test]
    async fn a_second_proof_op_attempt_after_a_failure_is_refused() {
        // No chain_verifier is configured in this fixture, so every
        // verify_proof call dispatched here fails — exercising the
        // refuse-on-repeat path rather than the success/terminal one.
        let llm: Arc<dyn pg_skills::LLMProvider> =
            Arc::new(StubLLM(ToolCall { name: "verify_proof".to_string(), arguments: json!({"circuitId": "coinbase_attestation", "proof": "0x00", "publicInputs": ["0x00"]}) }));
        let state = state(Some(llm));
        let request = ChatCompletionRequest { messages: vec![ChatMessage { role: "user".to_string(), content: "verify my proof twice".to_string() }], stream: false };
        let resp = completions(State(state), HeaderMap::new(), Json(request)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert!(value["choices"][0]["message"]["content"].as_str().unwrap().contains("only one verify_proof call is allowed"));
        assert!(value.get("x_proofport_result").is_none());
    }
}
