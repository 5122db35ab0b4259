//! `.well-known/` discovery routes. Each handler just resolves
//! [`AppState::discovery_config`] and hands it to the matching
//! `pg_discovery` builder; no gateway-specific logic lives here.

use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use pg_discovery::{build_agent_card, build_mcp_discovery, build_oasf_descriptor};
use serde_json::Value;
use std::sync::Arc;

/// `GET /.well-known/agent.json` and its `/.well-known/agent-card.json`
/// alias.
pub async fn agent_card(State(state): State<Arc<AppState>>) -> Json<Value> {
    let card = build_agent_card(&state.discovery_config());
    Json(serde_json::to_value(card).unwrap_or(Value::Null))
}

/// `GET /.well-known/oasf.json`.
pub async fn oasf_descriptor(State(state): State<Arc<AppState>>) -> Json<Value> {
    let descriptor = build_oasf_descriptor(&state.discovery_config());
    Json(serde_json::to_value(descriptor).unwrap_or(Value::Null))
}

/// `GET /.well-known/mcp.json`.
pub async fn mcp_discovery(State(state): State<Arc<AppState>>) -> Json<Value> {
    let endpoint = format!("{}/mcp", state.base_url().trim_end_matches('/'));
    let discovery = build_mcp_discovery(&endpoint);
    Json(serde_json::to_value(discovery).unwrap_or(Value::Null))
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
    use std::time::Duration;

    fn state() -> Arc<AppState> {
        let config = Config::parse_from(["proofport-gateway"]);
        let kv: std::sync::Arc<dyn pg_kv::KvStore> = std::sync::Arc::new(InMemoryKvStore::new());
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
    async fn agent_card_handler_returns_protocol_version() {
        let Json(body) = agent_card(State(state())).await;
        assert_eq!(body["protocolVersion"], "0.3.0");
    }

    #[tokio::test]
    async fn oasf_handler_returns_schema_version() {
        let Json(body) = oasf_descriptor(State(state())).await;
        assert_eq!(body["schemaVersion"], "0.1");
    }

    #[tokio::test]
    async fn mcp_handler_builds_endpoint_from_base_url() {
        let Json(body) = mcp_discovery(State(state())).await;
        assert_eq!(body["endpoint"], "http://localhost:8787/mcp");
    }
}
