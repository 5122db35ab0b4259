//! `/api/v1/*`, `/healthz`, `/readyz`: direct HTTP mappings of the skill
//! layer plus the flow orchestrator. Grounded on the teacher's one
//! handler-per-route shape (`cmd_run`, `cmd_status` in `abp-daemon`),
//! generalized from CLI subcommands to REST verbs.

use crate::error::ApiError;
use crate::payment_gate::{self, GateOutcome};
use crate::skill_dispatch;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use pg_core::error::{ErrorKind, GatewayError};
use pg_flow::CreateFlowParams;
use pg_skills::{verify_proof, PublicInputs, VerifyProofArgs};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::Stream;

const PROOF_DEADLINE: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
pub struct CircuitsQuery {
    #[serde(rename = "chainId")]
    chain_id: Option<String>,
}

pub async fn circuits(State(state): State<Arc<AppState>>, Query(query): Query<CircuitsQuery>) -> Result<Json<Value>, ApiError> {
    let result = skill_dispatch::dispatch(&state.deps, "get_supported_circuits", &from_query(query.chain_id)).await?;
    Ok(Json(result))
}

fn from_query(chain_id: Option<String>) -> Map<String, Value> {
    let mut map = Map::new();
    if let Some(chain_id) = chain_id {
        map.insert("chainId".to_string(), Value::String(chain_id));
    }
    map
}

pub async fn create_signing(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Result<Json<Value>, ApiError> {
    let params = body.as_object().cloned().unwrap_or_default();
    let result = skill_dispatch::dispatch(&state.deps, "request_signing", &params).await?;
    Ok(Json(result))
}

pub async fn signing_status(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let mut params = Map::new();
    params.insert("requestId".to_string(), Value::String(id));
    let result = skill_dispatch::dispatch(&state.deps, "check_status", &params).await?;
    Ok(Json(result))
}

pub async fn signing_payment(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let mut params = Map::new();
    params.insert("requestId".to_string(), Value::String(id));
    let result = skill_dispatch::dispatch(&state.deps, "request_payment", &params).await?;
    Ok(Json(result))
}

/// `POST /api/v1/proofs`: the one REST route the payment gate applies to.
pub async fn create_proof(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let header = payment_gate::extract_payment_header(|name| headers.get(name).and_then(|v| v.to_str().ok()));
    let resource_url = format!("{}/api/v1/proofs", state.base_url().trim_end_matches('/'));
    let outcome = match payment_gate::check(&state, true, &resource_url, "Generate a zero-knowledge proof", header).await {
        Ok(outcome) => outcome,
        Err(err) => return ApiError(err).into_response(),
    };
    if let GateOutcome::Required(requirements) = outcome {
        return payment_required_response(&requirements);
    }

    let params = body.as_object().cloned().unwrap_or_default();
    let dispatch = tokio::time::timeout(PROOF_DEADLINE, skill_dispatch::dispatch(&state.deps, "generate_proof", &params));
    match dispatch.await {
        Ok(Ok(result)) => (StatusCode::OK, Json(result)).into_response(),
        Ok(Err(err)) => ApiError(err).into_response(),
        Err(_) => ApiError(GatewayError::new(ErrorKind::UpstreamTimeout, "proof generation timed out")).into_response(),
    }
}

fn payment_required_response(requirements: &pg_payment::types::PaymentRequirements) -> Response {
    let body = serde_json::to_string(requirements).unwrap_or_default();
    let header_value = axum::http::HeaderValue::from_str(&body).unwrap_or(axum::http::HeaderValue::from_static("{}"));
    let mut resp = (StatusCode::PAYMENT_REQUIRED, Json(json!({"error": "payment required", "accepts": requirements}))).into_response();
    resp.headers_mut().insert(payment_gate::PAYMENT_REQUIRED_HEADER, header_value);
    resp
}

pub async fn verify_proof_route(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Result<Json<Value>, ApiError> {
    let params = body.as_object().cloned().unwrap_or_default();
    let result = skill_dispatch::dispatch(&state.deps, "verify_proof", &params).await?;
    Ok(Json(result))
}

/// `GET /api/v1/verify/{proofId}`: loads the stored proof, re-runs the
/// on-chain verifier, and returns a QR-friendly summary.
pub async fn verify_by_id(State(state): State<Arc<AppState>>, Path(proof_id): Path<String>, Query(query): Query<CircuitsQuery>) -> Result<Json<Value>, ApiError> {
    let record = state.deps.proofs.get(&proof_id).await?;
    let verifier_address = pg_skills::verifier_address(&record.circuit_id, query.chain_id.as_deref())
        .ok_or_else(|| GatewayError::not_found(format!("no verifier deployed for circuitId {}", record.circuit_id)))?;

    let result = verify_proof(
        &state.deps,
        VerifyProofArgs {
            circuit_id: record.circuit_id.clone(),
            proof: record.proof.clone(),
            public_inputs: PublicInputs::Words(record.public_inputs.clone()),
            chain_id: query.chain_id.clone(),
        },
    )
    .await?;

    Ok(Json(json!({
        "isValid": result.valid,
        "verifierAddress": verifier_address,
        "chainId": query.chain_id.unwrap_or_else(|| "84532".to_string()),
        "nullifier": record.nullifier,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CreateFlowBody {
    #[serde(rename = "circuitId")]
    circuit_id: String,
    scope: String,
    #[serde(default, rename = "countryList")]
    country_list: Option<Vec<String>>,
    #[serde(default, rename = "isIncluded")]
    is_included: Option<bool>,
}

pub async fn create_flow(State(state): State<Arc<AppState>>, Json(body): Json<CreateFlowBody>) -> Result<Json<Value>, ApiError> {
    let flow = pg_flow::create_flow(
        &state.deps,
        &state.flows,
        CreateFlowParams {
            circuit_id: body.circuit_id,
            scope: body.scope,
            country_list: body.country_list,
            is_included: body.is_included,
        },
    )
    .await?;
    Ok(Json(serde_json::to_value(flow).unwrap_or(Value::Null)))
}

pub async fn get_flow(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let flow = state.flows.get(&id).await?;
    Ok(Json(serde_json::to_value(flow).unwrap_or(Value::Null)))
}

/// `GET /api/v1/flow/{id}/events`: initial snapshot, then live phase
/// transitions with a 5s auto-advance fallback so polling-only deployments
/// (no pub/sub fan-out reaching this connection) still progress.
type SseItem = Result<SseEvent, std::convert::Infallible>;
type BoxedSseStream = std::pin::Pin<Box<dyn Stream<Item = SseItem> + Send>>;

pub async fn flow_events(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Sse<BoxedSseStream>, ApiError> {
    let flow = state.flows.get(&id).await?;
    let initial = SseEvent::default().event("phase").json_data(&flow).unwrap_or(SseEvent::default());

    if flow.phase.is_terminal() {
        let done = SseEvent::default().event("done").data("{}");
        let stream: BoxedSseStream = Box::pin(tokio_stream::iter(vec![Ok(initial), Ok(done)]));
        return Ok(Sse::new(stream));
    }

    let sub = state.flows.subscribe_events(&id).await?;
    let rest = flow_event_stream(state.clone(), id, sub);
    let stream: BoxedSseStream = Box::pin(tokio_stream::once(Ok(initial)).chain(rest));
    Ok(Sse::new(stream))
}

fn flow_event_stream(state: Arc<AppState>, flow_id: String, sub: pg_kv::Subscription) -> impl Stream<Item = SseItem> {
    let advance_interval = state.config.flow_poll_interval();
    let ticker = tokio::time::interval(advance_interval);
    futures::stream::unfold((state, flow_id, sub, ticker), |(state, flow_id, mut sub, mut ticker)| async move {
        loop {
            tokio::select! {
                published = sub.recv() => {
                    let Some(raw) = published else { return None };
                    let event = SseEvent::default().event("phase").data(raw);
                    return Some((Ok(event), (state, flow_id, sub, ticker)));
                }
                _ = ticker.tick() => {
                    match pg_flow::advance_flow(&state.deps, &state.flows, &flow_id).await {
                        Ok(flow) if flow.phase.is_terminal() => {
                            let event = SseEvent::default().event("done").data("{}");
                            return Some((Ok(event), (state, flow_id, sub, ticker)));
                        }
                        Ok(_) => continue,
                        Err(err) => {
                            tracing::warn!(flow_id = %flow_id, error = %err, "flow auto-advance failed");
                            continue;
                        }
                    }
                }
            }
        }
    })
}

pub async fn healthz() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

pub async fn readyz(State(state): State<Arc<AppState>>) -> Response {
    match state.kv.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({"status": "ready"}))).into_response(),
        Err(err) => (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"status": "not_ready", "reason": err.message}))).into_response(),
    }
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
            chain_verifier: Some(Arc::new(crate::providers::MockChainVerifier)),
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
    async fn healthz_always_reports_ok() {
        let Json(body) = healthz().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn readyz_reports_ready_against_a_live_kv_store() {
        let resp = readyz(State(state())).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn circuits_lists_without_payment() {
        let resp = circuits(State(state()), Query(CircuitsQuery { chain_id: None })).await.unwrap();
        assert!(resp.0["circuits"].is_array());
    }

    #[tokio::test]
    async fn create_proof_is_gated_when_payment_mode_is_testnet() {
        let config = Config::parse_from([
            "proofport-gateway",
            "--payment-mode",
            "testnet",
            "--payment-pay-to",
            "0xpayto",
            "--payment-facilitator-url",
            "https://facilitator.example",
        ]);
        let mut app = state();
        Arc::get_mut(&mut app).unwrap().config = config;
        Arc::get_mut(&mut app).unwrap().deps.payment_mode = PaymentMode::Testnet;
        let resp = create_proof(State(app), HeaderMap::new(), Json(json!({}))).await;
        assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[tokio::test]
    async fn flow_lifecycle_create_then_get() {
        let state = state();
        let resp = create_flow(
            State(state.clone()),
            Json(CreateFlowBody { circuit_id: "coinbase_attestation".to_string(), scope: "e2e.app".to_string(), country_list: None, is_included: None }),
        )
        .await
        .unwrap();
        let flow_id = resp.0["flowId"].as_str().unwrap().to_string();

        let loaded = get_flow(State(state), Path(flow_id)).await.unwrap();
        assert_eq!(loaded.0["phase"], "signing");
    }
}
