//! `generate_proof`: session-mode or direct-mode proof generation.

use crate::circuits;
use crate::deps::{ProofCacheKey, ProveParams, SkillDeps, TeeMode};
use pg_core::error::{ErrorKind, GatewayError};
use pg_core::proof::ProofRecord;
use pg_core::session::{PaymentSubStatus, SigningStatus};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// Arguments to `generate_proof`. Exactly one of the two modes must be
/// satisfiable: session mode via `request_id`, direct mode via the four
/// inline fields (only valid when payment is disabled).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateProofArgs {
    /// Session mode: the bound proof-request session id.
    #[serde(default, rename = "requestId")]
    pub request_id: Option<String>,
    /// Direct mode: signer address.
    #[serde(default)]
    pub address: Option<String>,
    /// Direct mode: signature over the signal hash.
    #[serde(default)]
    pub signature: Option<String>,
    /// Direct mode: privacy-domain scope.
    #[serde(default)]
    pub scope: Option<String>,
    /// Direct mode: target circuit id.
    #[serde(default, rename = "circuitId")]
    pub circuit_id: Option<String>,
    /// Direct mode: circuit-specific country list.
    #[serde(default, rename = "countryList")]
    pub country_list: Option<Vec<String>>,
    /// Direct mode: circuit-specific inclusion flag.
    #[serde(default, rename = "isIncluded")]
    pub is_included: Option<bool>,
}

/// Result of `generate_proof`.
#[derive(Debug, Serialize)]
pub struct GenerateProofResult {
    /// Hex-encoded proof blob.
    pub proof: String,
    #[serde(rename = "publicInputs")]
    /// Hex-encoded public inputs.
    pub public_inputs: Vec<String>,
    /// Hex-encoded nullifier.
    pub nullifier: String,
    #[serde(rename = "signalHash")]
    /// Hex-encoded signal hash.
    pub signal_hash: String,
    #[serde(rename = "proofId")]
    /// Id the proof was stored under.
    pub proof_id: String,
    #[serde(rename = "verifyUrl")]
    /// URL that re-verifies this proof by id.
    pub verify_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Present and `true` only on a cache hit.
    pub cached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Hex- or base64-encoded TEE attestation, when requested.
    pub attestation: Option<String>,
    #[serde(rename = "paymentTxHash", skip_serializing_if = "Option::is_none")]
    /// The settled payment's transaction hash, carried through from the
    /// session record in session mode.
    pub payment_tx_hash: Option<String>,
}

struct ResolvedInputs {
    address: String,
    signature: String,
    scope: String,
    circuit_id: String,
    country_list: Option<Vec<String>>,
    is_included: Option<bool>,
    payment_tx_hash: Option<String>,
}

/// Generate (or retrieve from cache) a proof, in session or direct mode.
pub async fn generate_proof(
    deps: &SkillDeps,
    args: GenerateProofArgs,
) -> Result<GenerateProofResult, GatewayError> {
    let resolved = resolve_inputs(deps, args).await?;

    let circuit = circuits::find_circuit(&resolved.circuit_id)
        .ok_or_else(|| GatewayError::invalid_argument(format!("unknown circuitId: {}", resolved.circuit_id)))?;
    if circuit.requires_country_fields && (resolved.country_list.is_none() || resolved.is_included.is_none()) {
        return Err(GatewayError::invalid_argument(
            "countryList and isIncluded are required for this circuit",
        ));
    }

    if let Some(limiter) = &deps.rate_limiter {
        limiter.check(&resolved.address).await?;
    }

    let cache_key = ProofCacheKey {
        circuit_id: resolved.circuit_id.clone(),
        address: resolved.address.clone(),
        scope: resolved.scope.clone(),
        country_list: resolved.country_list.clone(),
        is_included: resolved.is_included,
    };

    let (output, cached) = if let Some(cache) = &deps.proof_cache {
        if let Some(hit) = cache.get(&cache_key).await? {
            tracing::debug!(circuit_id = %resolved.circuit_id, "proof cache hit");
            (hit, true)
        } else {
            let output = prove(deps, &resolved).await?;
            cache.put(&cache_key, &output).await?;
            (output, false)
        }
    } else {
        (prove(deps, &resolved).await?, false)
    };

    let attestation = if deps.tee_attestation_enabled {
        if let Some(tee) = &deps.tee {
            let digest = hex::encode(Keccak256::digest(output.proof.as_bytes()));
            Some(tee.attest(&digest).await?)
        } else {
            None
        }
    } else {
        None
    };

    let record = ProofRecord::new(
        resolved.circuit_id.clone(),
        output.proof.clone(),
        output.public_inputs.clone(),
        output.nullifier.clone(),
        output.signal_hash.clone(),
    );
    deps.proofs.create(&record).await?;

    Ok(GenerateProofResult {
        proof: output.proof,
        public_inputs: output.public_inputs,
        nullifier: output.nullifier,
        signal_hash: output.signal_hash,
        verify_url: format!("{}/verify/{}", deps.sign_page_base_url, record.id),
        proof_id: record.id,
        cached: cached.then_some(true),
        attestation,
        payment_tx_hash: resolved.payment_tx_hash,
    })
}

async fn resolve_inputs(deps: &SkillDeps, args: GenerateProofArgs) -> Result<ResolvedInputs, GatewayError> {
    if let Some(request_id) = &args.request_id {
        let record = deps.sessions.get(request_id).await?;
        if record.status != SigningStatus::Completed {
            return Err(GatewayError::invalid_argument("signing has not completed for this session"));
        }
        if deps.payment_mode.requires_payment() && record.payment_status != Some(PaymentSubStatus::Completed) {
            return Err(GatewayError::invalid_argument("payment has not completed for this session"));
        }
        let address = record
            .address
            .clone()
            .ok_or_else(|| GatewayError::new(ErrorKind::Internal, "signed session missing address"))?;
        let signature = record
            .signature
            .clone()
            .ok_or_else(|| GatewayError::new(ErrorKind::Internal, "signed session missing signature"))?;
        let payment_tx_hash = record.payment_tx_hash.clone();
        let resolved = ResolvedInputs {
            address,
            signature,
            scope: record.scope.clone(),
            circuit_id: record.circuit_id.clone(),
            country_list: record.country_list.clone(),
            is_included: record.is_included,
            payment_tx_hash,
        };
        deps.sessions.consume(request_id).await?;
        return Ok(resolved);
    }

    if deps.payment_mode.requires_payment() {
        return Err(GatewayError::invalid_argument(
            "direct-mode generate_proof requires payment to be disabled",
        ));
    }
    let address = args
        .address
        .ok_or_else(|| GatewayError::invalid_argument("address is required in direct mode"))?;
    let signature = args
        .signature
        .ok_or_else(|| GatewayError::invalid_argument("signature is required in direct mode"))?;
    let scope = args
        .scope
        .ok_or_else(|| GatewayError::invalid_argument("scope is required in direct mode"))?;
    let circuit_id = args
        .circuit_id
        .ok_or_else(|| GatewayError::invalid_argument("circuitId is required in direct mode"))?;

    Ok(ResolvedInputs {
        address,
        signature,
        scope,
        circuit_id,
        country_list: args.country_list,
        is_included: args.is_included,
        payment_tx_hash: None,
    })
}

async fn prove(
    deps: &SkillDeps,
    resolved: &ResolvedInputs,
) -> Result<crate::deps::ProveOutput, GatewayError> {
    let params = ProveParams {
        address: resolved.address.clone(),
        signature: resolved.signature.clone(),
        scope: resolved.scope.clone(),
        country_list: resolved.country_list.clone(),
        is_included: resolved.is_included,
    };
    match (deps.tee_mode, &deps.tee) {
        (TeeMode::Nitro, Some(tee)) => tee.prove(&resolved.circuit_id, &params).await,
        _ => deps.prover.prove(&resolved.circuit_id, &params).await,
    }
}
