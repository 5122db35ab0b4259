#![deny(unsafe_code)]
use anyhow::{Context, Result};
use clap::Parser;
use pg_events::EventBus;
use pg_gateway::config::Config;
use pg_gateway::middleware::{CorsConfig, RateLimiter as HttpRateLimiter};
use pg_gateway::providers::{
    InMemoryProofCache, InMemoryRateLimiter, LoggingReputationSink, MockChainVerifier, MockProver, OpenAiToolRouter,
};
use pg_gateway::state::AppState;
use pg_gateway::{build_app, settlement};
use pg_kv::InMemoryKvStore;
use pg_payment::{FacilitatorClient, FacilitatorConfig};
use pg_skills::SkillDeps;
use pg_store::{FlowStore, PaymentStore, ProofStore, SessionStore, TaskStore};
use pg_worker::Worker;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    config.validate().map_err(anyhow::Error::msg)?;

    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(config.log_filter())).init();

    let kv: Arc<dyn pg_kv::KvStore> = Arc::new(InMemoryKvStore::new());

    let facilitator = match &config.payment_facilitator_url {
        Some(url) => Some(FacilitatorClient::new(FacilitatorConfig::new(url.clone())).context("build facilitator client")?),
        None => None,
    };

    let llm: Option<Arc<dyn pg_skills::LLMProvider>> = if let Some(key) = &config.openai_api_key {
        Some(Arc::new(OpenAiToolRouter::new("https://api.openai.com/v1", key.clone(), "gpt-4o-mini")))
    } else {
        config
            .gemini_api_key
            .as_ref()
            .map(|key| Arc::new(OpenAiToolRouter::new("https://generativelanguage.googleapis.com/v1beta/openai", key.clone(), "gemini-1.5-flash")) as Arc<dyn pg_skills::LLMProvider>)
    };

    let chain_verifier: Option<Arc<dyn pg_skills::ChainVerifier>> =
        if config.chain_rpc_url.is_some() || config.base_rpc_url.is_some() { Some(Arc::new(MockChainVerifier)) } else { None };

    let deps = SkillDeps {
        sessions: SessionStore::new(kv.clone()),
        payments: PaymentStore::new(kv.clone()),
        proofs: ProofStore::new(kv.clone()),
        tasks: TaskStore::new(kv.clone()),
        sign_page_base_url: config.sign_page_url.clone(),
        signing_ttl: config.signing_ttl(),
        payment_mode: config.payment_mode.into(),
        payment_price: config.payment_proof_price.clone(),
        payment_network: config.payment_network.clone(),
        payment_currency: config.payment_currency.clone(),
        tee_mode: config.tee_mode.into(),
        tee_attestation_enabled: config.tee_attestation_enabled,
        prover: Arc::new(MockProver),
        tee: None,
        llm,
        reputation: Some(Arc::new(LoggingReputationSink)),
        rate_limiter: Some(Arc::new(InMemoryRateLimiter::new(30, std::time::Duration::from_secs(60)))),
        proof_cache: Some(Arc::new(InMemoryProofCache::new())),
        chain_verifier,
    };

    let tasks = TaskStore::new(kv.clone());
    let flows = FlowStore::new(kv.clone());
    let events = Arc::new(EventBus::new());

    let worker = Worker::new(tasks.clone(), events.clone(), deps.clone(), config.task_poll_interval());
    tokio::spawn(async move { worker.run().await });

    let state = Arc::new(AppState {
        deps,
        kv,
        tasks,
        flows,
        events,
        facilitator,
        http_rate_limiter: HttpRateLimiter::new(600, std::time::Duration::from_secs(60)),
        cors: CorsConfig::from_origins(config.cors_origins()),
        config: config.clone(),
    });

    if state.facilitator.is_some() {
        let settlement_state = state.clone();
        let interval = config.settlement_poll_interval();
        tokio::spawn(async move { settlement::run(settlement_state, interval).await });
    }

    let app = build_app(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("bind {addr}"))?;
    tracing::info!(bind = %addr, deploy_env = %config.deploy_env, "proofport-gateway listening");

    axum::serve(listener, app).await.context("serve")
}
