//! `verify_proof`: public-input normalization plus an on-chain verifier
//! contract call, with reverts captured rather than raised.

use crate::circuits;
use crate::deps::SkillDeps;
use pg_core::error::{ErrorKind, GatewayError};
use serde::{Deserialize, Serialize};

/// Arguments to `verify_proof`.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyProofArgs {
    /// Target circuit id.
    #[serde(rename = "circuitId")]
    pub circuit_id: String,
    /// Hex-encoded proof blob.
    pub proof: String,
    /// Public inputs, either as one contiguous hex string or an array of
    /// hex words.
    #[serde(rename = "publicInputs")]
    pub public_inputs: PublicInputs,
    /// Chain to verify against; defaults to the gateway's default network.
    #[serde(default, rename = "chainId")]
    pub chain_id: Option<String>,
}

/// The two accepted shapes for `publicInputs`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PublicInputs {
    /// Already-split hex words. Tried first so an array on the wire is
    /// never misread as a single hex string.
    Words(Vec<String>),
    /// A single contiguous hex string, split into 32-byte (64 hex char)
    /// words, the final word right-padded with zero bytes if short.
    Hex(String),
}

/// Result of `verify_proof`.
#[derive(Debug, Serialize)]
pub struct VerifyProofResult {
    /// Whether the verifier accepted the proof.
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Present only when `valid` is `false`.
    pub error: Option<String>,
}

/// Split a contiguous hex string (with or without `0x` prefix) into
/// 32-byte words, right-padding the final word with zero bytes if it is
/// short. Equivalent, per spec, to supplying the same words directly.
pub fn split_hex_to_bytes32(hex_str: &str) -> Vec<String> {
    let stripped = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    let bytes = match hex::decode(stripped) {
        Ok(b) => b,
        Err(_) => return Vec::new(),
    };
    bytes
        .chunks(32)
        .map(|chunk| {
            let mut word = [0u8; 32];
            word[..chunk.len()].copy_from_slice(chunk);
            format!("0x{}", hex::encode(word))
        })
        .collect()
}

fn normalize(inputs: PublicInputs) -> Vec<String> {
    match inputs {
        PublicInputs::Hex(s) => split_hex_to_bytes32(&s),
        PublicInputs::Words(words) => words,
    }
}

/// Normalize `publicInputs`, resolve the verifier address, and delegate to
/// the configured [`crate::deps::ChainVerifier`]. Contract reverts come
/// back as `{valid: false, error}`, never as an `Err`.
pub async fn verify_proof(deps: &SkillDeps, args: VerifyProofArgs) -> Result<VerifyProofResult, GatewayError> {
    let public_inputs = normalize(args.public_inputs);

    let verifier_address = circuits::verifier_address(&args.circuit_id, args.chain_id.as_deref())
        .ok_or_else(|| GatewayError::not_found(format!("no verifier deployed for circuitId {}", args.circuit_id)))?;

    let chain_verifier = deps
        .chain_verifier
        .as_ref()
        .ok_or_else(|| GatewayError::new(ErrorKind::Internal, "no chain verifier configured"))?;

    let chain_id = args.chain_id.as_deref().unwrap_or("84532");
    let outcome = chain_verifier
        .verify(chain_id, verifier_address, &args.proof, &public_inputs)
        .await?;

    Ok(VerifyProofResult { valid: outcome.valid, error: outcome.error })
}
