//! `check_status`: pure, idempotent session phase lookup.

use crate::deps::SkillDeps;
use chrono::{DateTime, Utc};
use pg_core::error::GatewayError;
use pg_core::session::{PaymentSubStatus, SessionPhase, SigningStatus};
use serde::Serialize;

/// Signing sub-status as surfaced on the wire.
#[derive(Debug, Serialize)]
pub struct SigningStatusView {
    /// `"pending"` or `"completed"`.
    pub status: &'static str,
}

/// Payment sub-status as surfaced on the wire.
#[derive(Debug, Serialize)]
pub struct PaymentStatusView {
    /// `"not_required"`, `"pending"`, or `"completed"`.
    pub status: &'static str,
    #[serde(rename = "paymentUrl", skip_serializing_if = "Option::is_none")]
    /// Present only when phase is `payment`.
    pub payment_url: Option<String>,
}

/// Result of `check_status`.
#[derive(Debug, Serialize)]
pub struct CheckStatusResult {
    /// Computed lifecycle phase.
    pub phase: SessionPhase,
    /// Signing sub-status view.
    pub signing: SigningStatusView,
    /// Payment sub-status view.
    pub payment: PaymentStatusView,
    #[serde(rename = "expiresAt")]
    /// Session expiry time.
    pub expires_at: DateTime<Utc>,
}

/// Load the session record and compute its phase. Observations never
/// mutate state.
pub async fn check_status(deps: &SkillDeps, request_id: &str) -> Result<CheckStatusResult, GatewayError> {
    let record = deps.sessions.get(request_id).await?;
    let now = Utc::now();
    let payment_required = deps.payment_mode.requires_payment();
    let phase = record.phase_at(now, payment_required);

    let signing = SigningStatusView {
        status: match record.status {
            SigningStatus::Pending => "pending",
            SigningStatus::Completed => "completed",
        },
    };

    let payment = if !payment_required {
        PaymentStatusView { status: "not_required", payment_url: None }
    } else {
        let status = match record.payment_status {
            Some(PaymentSubStatus::Completed) => "completed",
            Some(PaymentSubStatus::Pending) | None => "pending",
        };
        let payment_url = matches!(phase, SessionPhase::Payment)
            .then(|| format!("{}/pay/{}", deps.sign_page_base_url, record.id));
        PaymentStatusView { status, payment_url }
    };

    Ok(CheckStatusResult { phase, signing, payment, expires_at: record.expires_at })
}
