//! Deterministic default implementations of every opaque capability trait
//! the skill layer consumes, grounded on the teacher's `MockBackend`
//! idiom (local development backend with deterministic output, no real
//! SDK/RPC calls). These are what the gateway binary wires up out of the
//! box; a real deployment swaps them for vendor-specific clients behind
//! the same trait boundary.

use async_trait::async_trait;
use pg_core::error::{ErrorKind, GatewayError};
use pg_skills::{
    ChainVerifier, ChainVerifyOutcome, LLMProvider, ProofCache, ProofCacheKey, ProveOutput, ProveParams, Prover, RateLimiter,
    ReputationSink, ToolCall, ToolSpec,
};
use sha3::{Digest, Keccak256};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// A deterministic prover that derives a proof blob, nullifier, and signal
/// hash from keccak digests of the request fields, instead of invoking
/// `bb`/`nargo`. Suitable for local development and the test harness; a
/// production deployment supplies a real `Prover` over the same trait.
pub struct MockProver;

#[async_trait]
impl Prover for MockProver {
    async fn prove(&self, circuit_id: &str, params: &ProveParams) -> Result<ProveOutput, GatewayError> {
        let signal_hash = hex::encode(Keccak256::digest(format!("{}|{}|{circuit_id}", params.address, params.scope)));
        let nullifier = hex::encode(Keccak256::digest(format!("{}|{circuit_id}|{signal_hash}", params.address)));
        let proof = format!("0x{}", hex::encode(Keccak256::digest(format!("{}|{}|{circuit_id}", params.address, params.signature))));
        Ok(ProveOutput {
            proof,
            public_inputs: vec![format!("0x{signal_hash}")],
            nullifier: format!("0x{nullifier}"),
            signal_hash: format!("0x{signal_hash}"),
        })
    }
}

/// An on-chain verifier stub that accepts any proof produced by
/// [`MockProver`] for the matching circuit/public-inputs pair and rejects
/// everything else as a simulated revert.
pub struct MockChainVerifier;

#[async_trait]
impl ChainVerifier for MockChainVerifier {
    async fn verify(
        &self,
        _chain_id: &str,
        _verifier_address: &str,
        proof: &str,
        public_inputs: &[String],
    ) -> Result<ChainVerifyOutcome, GatewayError> {
        if proof.starts_with("0x") && !public_inputs.is_empty() {
            Ok(ChainVerifyOutcome { valid: true, error: None })
        } else {
            Ok(ChainVerifyOutcome { valid: false, error: Some("malformed proof or public inputs".to_string()) })
        }
    }
}

/// A reputation sink that logs fire-and-forget side effects instead of
/// submitting an on-chain transaction. Matches the ambient requirement
/// that reputation failures are only ever logged, never propagated.
pub struct LoggingReputationSink;

#[async_trait]
impl ReputationSink for LoggingReputationSink {
    async fn record_success(&self, address: &str, skill: &str) {
        tracing::info!(address, skill, "reputation: recorded success");
    }

    async fn record_failure(&self, address: &str, skill: &str, error_code: &str) {
        tracing::warn!(address, skill, error_code, "reputation: recorded failure");
    }
}

/// Per-address sliding-window rate limiter for proof generation,
/// independent of the HTTP-level limiter in [`crate::middleware`].
pub struct InMemoryRateLimiter {
    max_requests: u32,
    window: Duration,
    by_address: RwLock<std::collections::HashMap<String, Mutex<VecDeque<Instant>>>>,
}

impl InMemoryRateLimiter {
    /// Allow `max_requests` per address within a sliding `window`.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self { max_requests, window, by_address: RwLock::new(std::collections::HashMap::new()) }
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, address: &str) -> Result<(), GatewayError> {
        {
            let guard = self.by_address.read().await;
            if let Some(bucket) = guard.get(address) {
                if let Some(wait) = self.try_admit(bucket) {
                    return Err(GatewayError::new(ErrorKind::RateLimited, "too many proof requests")
                        .with_context("retryAfterSeconds", wait.as_secs()));
                }
                return Ok(());
            }
        }
        let mut guard = self.by_address.write().await;
        let bucket = guard.entry(address.to_string()).or_insert_with(|| Mutex::new(VecDeque::new()));
        if let Some(wait) = self.try_admit(bucket) {
            return Err(GatewayError::new(ErrorKind::RateLimited, "too many proof requests")
                .with_context("retryAfterSeconds", wait.as_secs()));
        }
        Ok(())
    }
}

impl InMemoryRateLimiter {
    fn try_admit(&self, bucket: &Mutex<VecDeque<Instant>>) -> Option<Duration> {
        let now = Instant::now();
        let mut timestamps = bucket.lock().unwrap();
        while let Some(&front) = timestamps.front() {
            if now.duration_since(front) > self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
        if timestamps.len() as u32 >= self.max_requests {
            let oldest = *timestamps.front().unwrap();
            return Some(self.window.saturating_sub(now.duration_since(oldest)));
        }
        timestamps.push_back(now);
        None
    }
}

/// A content-addressed in-memory proof cache. Useful for local development
/// and tests; a production deployment may back this with a shared kv
/// store instead.
#[derive(Default)]
pub struct InMemoryProofCache {
    entries: RwLock<std::collections::HashMap<ProofCacheKey, ProveOutput>>,
}

impl InMemoryProofCache {
    /// Build an empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProofCache for InMemoryProofCache {
    async fn get(&self, key: &ProofCacheKey) -> Result<Option<ProveOutput>, GatewayError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &ProofCacheKey, output: &ProveOutput) -> Result<(), GatewayError> {
        self.entries.write().await.insert(key.clone(), output.clone());
        Ok(())
    }
}

/// Forces a tool call out of an OpenAI-compatible `/v1/chat/completions`
/// endpoint via `tool_choice: "required"`, the same contract the gateway's
/// own chat surface exposes to its callers. Used for the router's
/// natural-language fallback when `message.skill_directive()` finds no
/// structured directive.
pub struct OpenAiToolRouter {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiToolRouter {
    /// Build a router against `base_url` (e.g. `https://api.openai.com/v1`)
    /// using `api_key` and `model`.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into(), api_key: api_key.into(), model: model.into() }
    }
}

#[async_trait]
impl LLMProvider for OpenAiToolRouter {
    async fn resolve_tool_call(&self, system_prompt: &str, user_text: &str, tools: &[ToolSpec]) -> Result<ToolCall, GatewayError> {
        let tool_defs: Vec<serde_json::Value> = tools
            .iter()
            .map(|t| serde_json::json!({"type": "function", "function": {"name": t.name, "description": t.description, "parameters": t.parameters}}))
            .collect();

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_text},
            ],
            "tools": tool_defs,
            "tool_choice": "required",
        });

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::new(ErrorKind::UpstreamTimeout, "LLM completion request failed").with_source(e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(GatewayError::new(ErrorKind::Internal, format!("LLM completion returned {status}")));
        }

        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| GatewayError::new(ErrorKind::Internal, "malformed LLM completion response").with_source(e))?;

        let call = payload["choices"][0]["message"]["tool_calls"][0]["function"].clone();
        let name = call["name"].as_str().ok_or_else(|| GatewayError::new(ErrorKind::NotRoutable, "model replied with plain text"))?;
        let arguments: serde_json::Value = call["arguments"]
            .as_str()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or(serde_json::Value::Null);

        Ok(ToolCall { name: name.to_string(), arguments })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_prover_is_deterministic_for_the_same_inputs() {
        let prover = MockProver;
        let params = ProveParams {
            address: "0xabc".to_string(),
            signature: "0xsig".to_string(),
            scope: "e2e.app".to_string(),
            country_list: None,
            is_included: None,
        };
        let a = prover.prove("coinbase_attestation", &params).await.unwrap();
        let b = prover.prove("coinbase_attestation", &params).await.unwrap();
        assert_eq!(a.signal_hash, b.signal_hash);
        assert_eq!(a.nullifier, b.nullifier);
    }

    #[tokio::test]
    async fn mock_chain_verifier_accepts_well_formed_proofs() {
        let verifier = MockChainVerifier;
        let outcome = verifier.verify("84532", "0xverifier", "0xproof", &["0xabc".to_string()]).await.unwrap();
        assert!(outcome.valid);
    }

    #[tokio::test]
    async fn mock_chain_verifier_rejects_empty_public_inputs() {
        let verifier = MockChainVerifier;
        let outcome = verifier.verify("84532", "0xverifier", "0xproof", &[]).await.unwrap();
        assert!(!outcome.valid);
    }

    #[tokio::test]
    async fn rate_limiter_refuses_after_the_limit_and_reports_retry_after() {
        let limiter = InMemoryRateLimiter::new(1, Duration::from_secs(60));
        limiter.check("0xabc").await.unwrap();
        let err = limiter.check("0xabc").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::RateLimited);
        assert!(err.context.contains_key("retryAfterSeconds"));
    }

    #[tokio::test]
    async fn rate_limiter_tracks_addresses_independently() {
        let limiter = InMemoryRateLimiter::new(1, Duration::from_secs(60));
        limiter.check("0xabc").await.unwrap();
        limiter.check("0xdef").await.unwrap();
    }

    #[tokio::test]
    async fn proof_cache_round_trips() {
        let cache = InMemoryProofCache::new();
        let key = ProofCacheKey {
            circuit_id: "coinbase_attestation".to_string(),
            address: "0xabc".to_string(),
            scope: "e2e.app".to_string(),
            country_list: None,
            is_included: None,
        };
        assert!(cache.get(&key).await.unwrap().is_none());
        let output = ProveOutput {
            proof: "0xproof".to_string(),
            public_inputs: vec!["0x01".to_string()],
            nullifier: "0xnull".to_string(),
            signal_hash: "0xsig".to_string(),
        };
        cache.put(&key, &output).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap().unwrap().proof, "0xproof");
    }
}
