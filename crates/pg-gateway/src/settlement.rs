//! Settlement worker: reconciles `pending` payments against the
//! facilitator on a fixed cadence (spec §4.11, §9 "at-most-once payment").
//! Grounded on the teacher's single poll-loop worker shape, generalized
//! from task processing to payment reconciliation.

use crate::state::AppState;
use pg_core::error::GatewayError;
use pg_payment::types::{ExactEvmPayload, PaymentPayload, PaymentRequirements, ResourceDescriptor, SCHEME_EXACT, TransferWithAuthorization};
use pg_payment::PaymentExtra;
use std::sync::Arc;
use std::time::Duration;

/// Poll `payment:status:pending` on `interval`, settling or refunding each
/// entry via the facilitator. Runs until the process exits; errors for a
/// single payment are logged and the payment is re-enqueued, not fatal to
/// the loop.
pub async fn run(state: Arc<AppState>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        if let Err(err) = reconcile_one(&state).await {
            tracing::warn!(error = %err, "settlement reconciliation pass failed");
        }
    }
}

async fn reconcile_one(state: &AppState) -> Result<(), GatewayError> {
    let Some(facilitator) = &state.facilitator else {
        return Ok(());
    };
    let Some(payment_id) = state.deps.payments.dequeue_pending().await? else {
        return Ok(());
    };

    let record = match state.deps.payments.get(&payment_id).await {
        Ok(record) => record,
        Err(err) => {
            tracing::warn!(payment_id, error = %err, "dropping pending payment id with no backing record");
            return Ok(());
        }
    };

    if record.status != pg_core::payment::PaymentStatus::Pending {
        return Ok(());
    }

    let payload = reconstruction_payload(state, &record);
    match facilitator.settle(&payload).await {
        Ok(response) if response.success => {
            state.deps.payments.mark_settled(&record.id).await?;
            tracing::info!(payment_id = %record.id, task_id = %record.task_id, "payment settled");
        }
        Ok(response) => {
            state.deps.payments.mark_refunded(&record.id).await?;
            tracing::warn!(
                payment_id = %record.id,
                task_id = %record.task_id,
                error = response.error_message.as_deref().unwrap_or("unknown"),
                "payment refunded"
            );
        }
        Err(err) => {
            tracing::warn!(payment_id = %record.id, error = %err, "facilitator settle call failed, re-enqueuing");
            state.deps.payments.enqueue_pending(&record.id).await?;
        }
    }
    Ok(())
}

/// The payment gate only persists a [`pg_core::payment::PaymentRecord`],
/// not the original signed authorization — the facilitator's `settle` call
/// is idempotent on the same authorization, so this rebuilds the minimal
/// payload the facilitator needs from the record. A production facilitator
/// that requires the original signature would need the gate to persist the
/// raw header alongside the record; tracked as a known gap, not silently
/// papered over.
fn reconstruction_payload(state: &AppState, record: &pg_core::payment::PaymentRecord) -> PaymentPayload {
    let config = &state.config;
    let requirements = PaymentRequirements {
        scheme: SCHEME_EXACT.to_string(),
        network: record.network.clone(),
        amount: record.amount.clone(),
        asset: config.payment_asset.clone(),
        pay_to: config.payment_pay_to.clone().unwrap_or_default(),
        max_timeout_seconds: config.payment_timeout_seconds,
        extra: PaymentExtra { name: "proofport-gateway".to_string(), version: env!("CARGO_PKG_VERSION").to_string() },
        resource: ResourceDescriptor {
            url: format!("{}/api/v1/proofs", config.a2a_base_url.trim_end_matches('/')),
            description: "Generate a proof".to_string(),
            mime_type: "application/json".to_string(),
        },
    };
    PaymentPayload {
        x402_version: 1,
        resource: requirements.resource.url.clone(),
        accepted: requirements,
        payload: ExactEvmPayload {
            signature: String::new(),
            authorization: TransferWithAuthorization {
                from: record.payer_address.clone(),
                to: config.payment_pay_to.clone().unwrap_or_default(),
                value: record.amount.clone(),
                valid_after: 0,
                valid_before: record.created_at.timestamp() + config.payment_timeout_seconds as i64,
                nonce: record.id.clone(),
            },
        },
    }
}
