//! `AppState`: the one value every handler is built against, grounded on
//! the teacher's `AppState { runtime, receipts, receipts_dir }` shape —
//! here widened to the gateway's stores, event bus, and skill deps.

use crate::config::Config;
use crate::middleware::{CorsConfig, RateLimiter as HttpRateLimiter};
use pg_discovery::{DiscoveryConfig, Erc8004Identity, X402SecurityScheme};
use pg_events::EventBus;
use pg_kv::KvStore;
use pg_payment::{FacilitatorClient, PaymentExtra};
use pg_skills::SkillDeps;
use pg_store::{FlowStore, TaskStore};
use std::sync::Arc;

/// Shared application state, cheap to clone (every field is an `Arc` or a
/// plain value) and passed to axum as `State<Arc<AppState>>`.
pub struct AppState {
    /// Canonical skill dependency bundle every skill call is invoked with.
    pub deps: SkillDeps,
    /// Raw kv handle, used only for the `/readyz` liveness ping — every
    /// other access goes through a typed store.
    pub kv: Arc<dyn KvStore>,
    /// Task store, shared by the A2A/REST adapters and the worker.
    pub tasks: TaskStore,
    /// Flow store, shared by the REST flow routes and the flow-advance loop.
    pub flows: FlowStore,
    /// Per-task event bus backing A2A/REST SSE streams.
    pub events: Arc<EventBus>,
    /// Facilitator client, present only when payment is enabled.
    pub facilitator: Option<FacilitatorClient>,
    /// HTTP-level sliding-window rate limiter, distinct from the
    /// proof-generation rate limiter carried on `deps`.
    pub http_rate_limiter: HttpRateLimiter,
    /// CORS configuration for the A2A and discovery routes.
    pub cors: CorsConfig,
    /// Resolved configuration, kept for handlers that need raw values
    /// (poll intervals, base URLs) the other fields don't carry.
    pub config: Config,
}

impl AppState {
    /// The gateway's base URL, used to assemble the MCP discovery endpoint
    /// and OpenAPI-style `servers[0].url`.
    pub fn base_url(&self) -> &str {
        &self.config.a2a_base_url
    }

    /// Build the shared [`DiscoveryConfig`] from resolved configuration.
    pub fn discovery_config(&self) -> DiscoveryConfig {
        let payment = self.config.payment_mode_x402();
        let identity = self.config.erc8004_identity();
        DiscoveryConfig {
            name: "proofport-gateway".to_string(),
            description: "Agent-native proof-serving gateway".to_string(),
            url: self.base_url().to_string(),
            payment,
            identity,
        }
    }
}

impl Config {
    fn payment_mode_x402(&self) -> Option<X402SecurityScheme> {
        if self.payment_mode == crate::config::PaymentModeArg::Disabled {
            return None;
        }
        Some(X402SecurityScheme {
            scheme: "exact".to_string(),
            network: self.payment_network.clone(),
            asset: self.payment_asset.clone(),
            pay_to: self.payment_pay_to.clone().unwrap_or_default(),
            max_timeout_seconds: self.payment_timeout_seconds,
            extra: PaymentExtra { name: "proofport-gateway".to_string(), version: env!("CARGO_PKG_VERSION").to_string() },
        })
    }

    fn erc8004_identity(&self) -> Option<Erc8004Identity> {
        let contract_address = self.erc8004_identity_address.clone()?;
        let token_id = self.erc8004_token_id.clone()?;
        Some(Erc8004Identity { contract_address, chain_id: self.erc8004_chain_id.clone(), token_id })
    }
}
