//! Opaque external capabilities the skill layer consumes, and the
//! `SkillDeps` bundle every skill is invoked with.

use async_trait::async_trait;
use pg_core::error::GatewayError;
use pg_store::{PaymentStore, ProofStore, SessionStore, TaskStore};
use std::sync::Arc;
use std::time::Duration;

/// Inputs a [`Prover`] (or [`TeeProvider`]) needs to produce a proof. The
/// session record is the only source of `address`/`signature` in session
/// mode; direct mode builds this the same way from request fields.
#[derive(Debug, Clone)]
pub struct ProveParams {
    /// Signer address the proof attests about.
    pub address: String,
    /// Signature over the signal hash.
    pub signature: String,
    /// Privacy-domain scope string.
    pub scope: String,
    /// Circuit-specific country list input.
    pub country_list: Option<Vec<String>>,
    /// Circuit-specific inclusion flag.
    pub is_included: Option<bool>,
}

/// A completed proof, ready for on-chain verification.
#[derive(Debug, Clone)]
pub struct ProveOutput {
    /// Hex-encoded proof blob.
    pub proof: String,
    /// Hex-encoded public inputs, one entry per 32-byte word.
    pub public_inputs: Vec<String>,
    /// Hex-encoded nullifier.
    pub nullifier: String,
    /// Hex-encoded `keccak256(address || scope || circuitId)`.
    pub signal_hash: String,
}

/// The ZK prover (`bb`/`nargo` invocation, witness construction, Merkle
/// tree construction over attester signer sets). Opaque: this crate only
/// needs to invoke it, not understand it.
#[async_trait]
pub trait Prover: Send + Sync {
    /// Produce a proof for `circuit_id` from `params`.
    async fn prove(&self, circuit_id: &str, params: &ProveParams) -> Result<ProveOutput, GatewayError>;
}

/// The Trusted Execution Environment (Nitro enclave vsock RPC). Used in
/// place of [`Prover`] when TEE mode is `nitro`, and optionally for
/// attestation over a completed proof's digest.
#[async_trait]
pub trait TeeProvider: Send + Sync {
    /// Produce a proof for `circuit_id` from `params`, inside the enclave.
    async fn prove(&self, circuit_id: &str, params: &ProveParams) -> Result<ProveOutput, GatewayError>;
    /// Attest over a digest (hex-encoded), returning an attestation
    /// document (hex- or base64-encoded, opaque to this crate).
    async fn attest(&self, digest_hex: &str) -> Result<String, GatewayError>;
}

/// A single catalog entry the router presents to an [`LLMProvider`] as a
/// tool the model may call.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    /// Skill name, matching one of the six canonical skills.
    pub name: String,
    /// Human-readable description shown to the model.
    pub description: String,
    /// JSON Schema for the tool's arguments object.
    pub parameters: serde_json::Value,
}

/// A tool call the model chose to make.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// The tool (skill) name the model selected.
    pub name: String,
    /// The arguments object the model supplied.
    pub arguments: serde_json::Value,
}

/// An LLM provider used for natural-language skill resolution when no data
/// part carries an explicit skill tag. Opaque: this crate only needs a
/// single tool-choice-required completion call.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Resolve `user_text` to exactly one tool call from `tools`, under a
    /// caller-enforced deadline. Returns `Err(NotRoutable)` if the model
    /// replies with plain text instead of a tool call.
    async fn resolve_tool_call(
        &self,
        system_prompt: &str,
        user_text: &str,
        tools: &[ToolSpec],
    ) -> Result<ToolCall, GatewayError>;
}

/// Fire-and-forget ERC-8004 reputation side effects. Failures are logged
/// by the caller (the worker), never propagated.
#[async_trait]
pub trait ReputationSink: Send + Sync {
    /// Record a successful skill invocation by `address`.
    async fn record_success(&self, address: &str, skill: &str);
    /// Record a failed skill invocation by `address`.
    async fn record_failure(&self, address: &str, skill: &str, error_code: &str);
}

/// Per-address admission control ahead of proof generation.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Returns `Ok(())` if `address` may proceed now, or
    /// `Err(RateLimited{retry_after})` (encoded in the error's context bag
    /// under `"retryAfterSeconds"`) otherwise.
    async fn check(&self, address: &str) -> Result<(), GatewayError>;
}

/// Outcome of an on-chain verifier contract call. Reverts are captured
/// here rather than raised as errors.
#[derive(Debug, Clone)]
pub struct ChainVerifyOutcome {
    /// Whether the verifier accepted the proof.
    pub valid: bool,
    /// Revert reason or other non-leaky explanation, present only when
    /// `valid` is `false`.
    pub error: Option<String>,
}

/// The on-chain verifier contract RPC client (`verify(bytes, bytes32[])`
/// view calls). Opaque: this crate only needs to invoke it.
#[async_trait]
pub trait ChainVerifier: Send + Sync {
    /// Call the verifier contract deployed at `verifier_address` on
    /// `chain_id`.
    async fn verify(
        &self,
        chain_id: &str,
        verifier_address: &str,
        proof: &str,
        public_inputs: &[String],
    ) -> Result<ChainVerifyOutcome, GatewayError>;
}

/// Content-addressed cache of previously computed proofs.
#[async_trait]
pub trait ProofCache: Send + Sync {
    /// Look up a cached proof for this exact input tuple.
    async fn get(&self, key: &ProofCacheKey) -> Result<Option<ProveOutput>, GatewayError>;
    /// Store a computed proof under this input tuple.
    async fn put(&self, key: &ProofCacheKey, output: &ProveOutput) -> Result<(), GatewayError>;
}

/// The proof cache key: `(circuitId, address, scope, countryList,
/// isIncluded)`. Deliberately excludes chain id (design note (d)); the
/// verifier lookup handles chain selection separately.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProofCacheKey {
    /// Circuit identifier.
    pub circuit_id: String,
    /// Signer address.
    pub address: String,
    /// Privacy-domain scope string.
    pub scope: String,
    /// Circuit-specific country list input, if any.
    pub country_list: Option<Vec<String>>,
    /// Circuit-specific inclusion flag, if any.
    pub is_included: Option<bool>,
}

/// TEE mode, mirroring the `teeMode` configuration knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeeMode {
    /// Local binary path, never the enclave.
    Disabled,
    /// Always route through the enclave.
    Nitro,
    /// Local TEE simulator (no real enclave).
    Local,
    /// Prefer the enclave, falling back to local when unavailable.
    Auto,
}

/// Payment mode, mirroring the `paymentMode` configuration knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMode {
    /// Payment middleware inactive; session-mode and direct-mode
    /// `generate_proof` both skip payment checks.
    Disabled,
    /// Testnet USDC.
    Testnet,
    /// Mainnet USDC.
    Mainnet,
}

impl PaymentMode {
    /// Whether payment is required under this mode.
    pub fn requires_payment(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// The bundle every skill is invoked with. Cheap to clone: every field is
/// either an `Arc` or a plain value.
#[derive(Clone)]
pub struct SkillDeps {
    /// Proof-request session store.
    pub sessions: SessionStore,
    /// Payment record store.
    pub payments: PaymentStore,
    /// Stored-proof retrieval store (`verify_proof` by id, QR codes).
    pub proofs: ProofStore,
    /// Task store, for `tasks/get`-adjacent lookups the skill layer needs
    /// read-only (skills never mutate it).
    pub tasks: TaskStore,
    /// Base URL the browser signing UI is served from.
    pub sign_page_base_url: String,
    /// Default TTL for newly created session records.
    pub signing_ttl: Duration,
    /// Payment mode.
    pub payment_mode: PaymentMode,
    /// Price per proof, in the smallest unit of the configured asset.
    pub payment_price: String,
    /// Payment asset/network identifiers surfaced in `request_payment`.
    pub payment_network: String,
    /// Payment asset currency code surfaced in `request_payment`.
    pub payment_currency: String,
    /// TEE mode.
    pub tee_mode: TeeMode,
    /// Whether to request a TEE attestation after a successful proof.
    pub tee_attestation_enabled: bool,
    /// The ZK prover.
    pub prover: Arc<dyn Prover>,
    /// The TEE provider, present only when TEE support is configured.
    pub tee: Option<Arc<dyn TeeProvider>>,
    /// The natural-language skill resolver, present only when an LLM
    /// provider is configured.
    pub llm: Option<Arc<dyn LLMProvider>>,
    /// Fire-and-forget reputation sink, present only when on-chain
    /// identity is configured.
    pub reputation: Option<Arc<dyn ReputationSink>>,
    /// Per-address rate limiter, present only when configured.
    pub rate_limiter: Option<Arc<dyn RateLimiter>>,
    /// Proof cache, present only when configured.
    pub proof_cache: Option<Arc<dyn ProofCache>>,
    /// The on-chain verifier RPC client, present once a chain RPC is
    /// configured (required for `verify_proof` to succeed).
    pub chain_verifier: Option<Arc<dyn ChainVerifier>>,
}
