//! Gateway library: routes, state, and middleware shared by the binary
//! and its test harness. Grounded on the teacher's `abp-daemon` crate
//! split (`lib.rs` owns `AppState`/`build_app`, `main.rs` owns process
//! bootstrap), widened from one route family to four concurrent wire
//! protocols over one canonical skill layer.

pub mod a2a;
pub mod chat;
pub mod config;
pub mod discovery;
pub mod error;
pub mod mcp;
pub mod middleware;
pub mod payment_gate;
pub mod providers;
pub mod rest;
pub mod settlement;
pub mod skill_dispatch;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use state::AppState;
use std::sync::Arc;
use tower::ServiceBuilder;

/// Build the full Axum router: A2A, MCP, REST, chat, discovery, and
/// health routes, wrapped in the shared middleware stack.
///
/// Mirrors the teacher's `build_app`: one flat `Router::new().route(...)`
/// chain, `with_state` at the end, no per-protocol sub-routers.
pub fn build_app(state: Arc<AppState>) -> Router {
    let cors = state.cors.to_cors_layer();
    let rate_limiter = state.http_rate_limiter.clone().into_layer();

    Router::new()
        .route("/a2a", post(a2a::dispatch))
        .route("/mcp", post(mcp::handle).get(mcp::method_not_allowed).delete(mcp::method_not_allowed))
        .route("/v1/chat/completions", post(chat::completions))
        .route("/v1/models", get(chat::models))
        .route("/api/v1/circuits", get(rest::circuits))
        .route("/api/v1/signing", post(rest::create_signing))
        .route("/api/v1/signing/{id}/status", get(rest::signing_status))
        .route("/api/v1/signing/{id}/payment", post(rest::signing_payment))
        .route("/api/v1/proofs", post(rest::create_proof))
        .route("/api/v1/proofs/verify", post(rest::verify_proof_route))
        .route("/api/v1/verify/{proofId}", get(rest::verify_by_id))
        .route("/api/v1/flow", post(rest::create_flow))
        .route("/api/v1/flow/{id}", get(rest::get_flow))
        .route("/api/v1/flow/{id}/events", get(rest::flow_events))
        .route("/healthz", get(rest::healthz))
        .route("/readyz", get(rest::readyz))
        .route("/.well-known/agent.json", get(discovery::agent_card))
        .route("/.well-known/agent-card.json", get(discovery::agent_card))
        .route("/.well-known/oasf.json", get(discovery::oasf_descriptor))
        .route("/.well-known/mcp.json", get(discovery::mcp_discovery))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::request_id_middleware))
                .layer(axum::middleware::from_fn(middleware::RequestLogger::layer))
                .layer(cors)
                .layer(rate_limiter),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::middleware::{CorsConfig, RateLimiter as HttpRateLimiter};
    use crate::providers::MockProver;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use clap::Parser;
    use pg_events::EventBus;
    use pg_kv::InMemoryKvStore;
    use pg_skills::{PaymentMode, SkillDeps, TeeMode};
    use pg_store::{FlowStore, PaymentStore, ProofStore, SessionStore, TaskStore};
    use std::time::Duration;
    use tower::ServiceExt;

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

    #[tokio::test]
    async fn healthz_is_reachable_through_the_full_router() {
        let app = build_app(state());
        let resp = app.oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn agent_card_is_served_at_both_well_known_paths() {
        let app = build_app(state());
        let resp = app.clone().oneshot(Request::builder().uri("/.well-known/agent.json").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = app.oneshot(Request::builder().uri("/.well-known/agent-card.json").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unconfigured_routes_404() {
        let app = build_app(state());
        let resp = app.oneshot(Request::builder().uri("/no-such-route").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
