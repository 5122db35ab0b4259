//! `request_payment`: idempotently marks a session as awaiting payment.

use crate::deps::SkillDeps;
use pg_core::error::GatewayError;
use pg_core::session::{PaymentSubStatus, SigningStatus};
use serde::Serialize;

/// Result of `request_payment`.
#[derive(Debug, Serialize)]
pub struct RequestPaymentResult {
    #[serde(rename = "paymentUrl")]
    /// Browser payment URL.
    pub payment_url: String,
    /// Price per proof, in the smallest unit of `currency`.
    pub amount: String,
    /// Asset currency code.
    pub currency: String,
    /// Network identifier.
    pub network: String,
}

/// Fails if payment is disabled, signing is not yet complete, or payment
/// is already complete. Otherwise idempotently sets payment status to
/// `pending`.
pub async fn request_payment(deps: &SkillDeps, request_id: &str) -> Result<RequestPaymentResult, GatewayError> {
    if !deps.payment_mode.requires_payment() {
        return Err(GatewayError::invalid_argument("payment is disabled"));
    }
    let mut record = deps.sessions.get(request_id).await?;
    if record.status != SigningStatus::Completed {
        return Err(GatewayError::invalid_argument("signing must complete before payment is requested"));
    }
    if record.payment_status == Some(PaymentSubStatus::Completed) {
        return Err(GatewayError::invalid_argument("payment is already complete"));
    }

    record.payment_status = Some(PaymentSubStatus::Pending);
    deps.sessions.update(&record, deps.signing_ttl).await?;

    Ok(RequestPaymentResult {
        payment_url: format!("{}/pay/{}", deps.sign_page_base_url, record.id),
        amount: deps.payment_price.clone(),
        currency: deps.payment_currency.clone(),
        network: deps.payment_network.clone(),
    })
}
