//! Proof-request sessions: the per-user signing + payment state that feeds
//! one proof generation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Signing sub-status of a [`ProofRequestRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningStatus {
    /// Signature not yet received.
    Pending,
    /// Signature received and validated.
    Completed,
}

/// Payment sub-status of a [`ProofRequestRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSubStatus {
    /// Payment requested but not yet settled.
    Pending,
    /// Payment settled.
    Completed,
}

/// The computed lifecycle phase of a session, per `check_status`'s rule
/// table (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Past `expires_at`.
    Expired,
    /// Signing not yet completed.
    Signing,
    /// Payment required and not yet completed.
    Payment,
    /// Signing and payment (if required) are both complete.
    Ready,
}

/// A one-shot, bearer-capability session record: the per-user
/// signing+payment state that feeds exactly one `generate_proof` call.
/// Consumed (deleted) on successful session-mode `generate_proof`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofRequestRecord {
    /// Unique request id (`requestId` on the wire).
    pub id: String,
    /// Privacy-domain scope string.
    pub scope: String,
    /// Target circuit identifier.
    pub circuit_id: String,
    /// Signing sub-status.
    pub status: SigningStatus,
    /// Signer address, once signed.
    pub address: Option<String>,
    /// Signature over the signal, once signed.
    pub signature: Option<String>,
    /// Re-derived `keccak256(address || scope || circuitId)`, once signed.
    pub signal_hash: Option<String>,
    /// Circuit-specific country list input.
    pub country_list: Option<Vec<String>>,
    /// Circuit-specific inclusion flag.
    pub is_included: Option<bool>,
    /// Payment sub-status, absent when payment is disabled.
    pub payment_status: Option<PaymentSubStatus>,
    /// On-chain transaction hash of the settled payment, once known.
    pub payment_tx_hash: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Expiry time; records observed at or after this instant read as
    /// `SessionPhase::Expired` regardless of their other fields.
    pub expires_at: DateTime<Utc>,
}

impl ProofRequestRecord {
    /// Create a fresh pending record with the given TTL, in seconds, from
    /// now.
    pub fn new(
        scope: impl Into<String>,
        circuit_id: impl Into<String>,
        ttl_seconds: i64,
        country_list: Option<Vec<String>>,
        is_included: Option<bool>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            scope: scope.into(),
            circuit_id: circuit_id.into(),
            status: SigningStatus::Pending,
            address: None,
            signature: None,
            signal_hash: None,
            country_list,
            is_included,
            payment_status: None,
            payment_tx_hash: None,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(ttl_seconds),
        }
    }

    /// Whether `now` is at or past `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Compute the session's phase at `now`, given whether payment is
    /// required at all (payment mode `disabled` short-circuits to
    /// `not_required`, which this function treats the same as "already
    /// satisfied").
    pub fn phase_at(&self, now: DateTime<Utc>, payment_required: bool) -> SessionPhase {
        if self.is_expired_at(now) {
            return SessionPhase::Expired;
        }
        if self.status != SigningStatus::Completed {
            return SessionPhase::Signing;
        }
        if payment_required && self.payment_status != Some(PaymentSubStatus::Completed) {
            return SessionPhase::Payment;
        }
        SessionPhase::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_record_is_signing_phase() {
        let r = ProofRequestRecord::new("e2e.app", "coinbase_attestation", 300, None, None);
        assert_eq!(r.phase_at(Utc::now(), true), SessionPhase::Signing);
    }

    #[test]
    fn expired_takes_priority_over_everything_else() {
        let mut r = ProofRequestRecord::new("e2e.app", "coinbase_attestation", 300, None, None);
        r.status = SigningStatus::Completed;
        r.payment_status = Some(PaymentSubStatus::Completed);
        let later = r.expires_at + chrono::Duration::seconds(1);
        assert_eq!(r.phase_at(later, true), SessionPhase::Expired);
    }

    #[test]
    fn payment_disabled_short_circuits_to_ready_once_signed() {
        let mut r = ProofRequestRecord::new("e2e.app", "coinbase_attestation", 300, None, None);
        r.status = SigningStatus::Completed;
        assert_eq!(r.phase_at(Utc::now(), false), SessionPhase::Ready);
    }

    #[test]
    fn payment_pending_blocks_ready() {
        let mut r = ProofRequestRecord::new("e2e.app", "coinbase_attestation", 300, None, None);
        r.status = SigningStatus::Completed;
        r.payment_status = Some(PaymentSubStatus::Pending);
        assert_eq!(r.phase_at(Utc::now(), true), SessionPhase::Payment);
    }
}
