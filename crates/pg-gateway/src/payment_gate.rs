//! Payment gate: challenge/verify for the selectively-gated routes (spec
//! §4.11). Recording a verified payment is split from settlement — this
//! module only verifies and records `pending`; `settlement.rs` reconciles.

use crate::state::AppState;
use pg_core::error::{ErrorKind, GatewayError};
use pg_core::payment::PaymentRecord;
use pg_payment::types::{PaymentPayload, PaymentRequirements, ResourceDescriptor, SCHEME_EXACT};
use pg_payment::PaymentExtra;

/// Header carrying the 402 challenge (a JSON-encoded [`PaymentRequirements`]).
pub const PAYMENT_REQUIRED_HEADER: &str = "PAYMENT-REQUIRED";
/// Header carrying the base64-encoded [`PaymentPayload`] on retry.
pub const PAYMENT_SIGNATURE_HEADER: &str = "PAYMENT-SIGNATURE";
/// Alias accepted for the same payload, matching x402 clients that send
/// `X-PAYMENT` instead of `PAYMENT-SIGNATURE`.
pub const X_PAYMENT_HEADER: &str = "X-PAYMENT";

/// Outcome of a payment-gate check.
pub enum GateOutcome {
    /// No payment was required, or a valid one was verified.
    Allowed,
    /// Payment is required and none was present or it did not verify.
    Required(Box<PaymentRequirements>),
}

/// Build the [`PaymentRequirements`] challenge for `resource_url`.
pub fn build_requirements(state: &AppState, resource_url: &str, description: &str) -> PaymentRequirements {
    let config = &state.config;
    PaymentRequirements {
        scheme: SCHEME_EXACT.to_string(),
        network: config.payment_network.clone(),
        amount: config.payment_proof_price.clone(),
        asset: config.payment_asset.clone(),
        pay_to: config.payment_pay_to.clone().unwrap_or_default(),
        max_timeout_seconds: config.payment_timeout_seconds,
        extra: PaymentExtra { name: "proofport-gateway".to_string(), version: env!("CARGO_PKG_VERSION").to_string() },
        resource: ResourceDescriptor {
            url: resource_url.to_string(),
            description: description.to_string(),
            mime_type: "application/json".to_string(),
        },
    }
}

/// Check whether `skill` is free, per the A2A/MCP bypass list (spec §4.11).
pub fn is_free_skill(skill: &str) -> bool {
    pg_skills::FREE_SKILLS.contains(&skill)
}

/// Extract the payment payload header value from either accepted name.
pub fn extract_payment_header<'a>(
    get: impl Fn(&str) -> Option<&'a str>,
) -> Option<&'a str> {
    get(PAYMENT_SIGNATURE_HEADER).or_else(|| get(X_PAYMENT_HEADER))
}

/// Verify a presented payment header against `requirements`, without
/// recording anything. Returns `Allowed` only when the facilitator accepts
/// the authorization.
pub async fn verify(
    state: &AppState,
    requirements: &PaymentRequirements,
    header_value: &str,
) -> Result<GateOutcome, GatewayError> {
    let payload = match PaymentPayload::from_base64(header_value) {
        Ok(p) => p,
        Err(_) => return Ok(GateOutcome::Required(Box::new(requirements.clone()))),
    };

    let Some(facilitator) = &state.facilitator else {
        return Err(GatewayError::new(ErrorKind::Internal, "payment enabled without a facilitator configured"));
    };

    let response = facilitator.verify(&payload).await?;
    if !response.is_valid {
        return Ok(GateOutcome::Required(Box::new(requirements.clone())));
    }

    Ok(GateOutcome::Allowed)
}

/// Run the full gate for a request: no-op when payment is disabled or the
/// route doesn't require it, otherwise verify the presented header (if
/// any) against a freshly built challenge.
pub async fn check(
    state: &AppState,
    requires_payment: bool,
    resource_url: &str,
    description: &str,
    header_value: Option<&str>,
) -> Result<GateOutcome, GatewayError> {
    if state.config.payment_mode == crate::config::PaymentModeArg::Disabled || !requires_payment {
        return Ok(GateOutcome::Allowed);
    }

    let requirements = build_requirements(state, resource_url, description);
    match header_value {
        None => Ok(GateOutcome::Required(Box::new(requirements))),
        Some(header) => verify(state, &requirements, header).await,
    }
}

/// Record a verified payment as `pending` once the gated task exists.
/// The settlement worker reconciles it to `settled`/`refunded`.
pub async fn record_pending(
    state: &AppState,
    task_id: &str,
    payload: &PaymentPayload,
    payer: Option<String>,
) -> Result<PaymentRecord, GatewayError> {
    let payer_address = payer.unwrap_or_else(|| payload.payload.authorization.from.clone());
    let record = PaymentRecord::new_pending(
        task_id,
        payer_address,
        payload.accepted.amount.clone(),
        payload.accepted.network.clone(),
        None,
    );
    state.deps.payments.create(&record).await?;
    Ok(record)
}
