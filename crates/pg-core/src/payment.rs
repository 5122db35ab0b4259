//! Payment records: at-most-once bookkeeping for settled micropayments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a [`PaymentRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Recorded synchronously after facilitator acceptance; not yet
    /// reconciled on-chain.
    Pending,
    /// Reconciled: the on-chain transaction confirmed.
    Settled,
    /// Reconciled: the transaction failed or was reverted.
    Refunded,
}

/// A single recorded micropayment, indexed by `task_id` and by `status`
/// for the settlement worker's batch reconciliation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Unique payment id.
    pub id: String,
    /// The task this payment gates.
    pub task_id: String,
    /// The address that signed the payment authorization.
    pub payer_address: String,
    /// Amount in the smallest unit of `network`'s asset, as a decimal
    /// integer string (avoids float precision loss).
    pub amount: String,
    /// Network identifier, e.g. `"base-sepolia"`.
    pub network: String,
    /// Current status.
    pub status: PaymentStatus,
    /// On-chain transaction hash, once known.
    pub transaction: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last status-transition time.
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Record a newly-accepted (facilitator-settled) payment as `pending`,
    /// per the at-most-once "record-then-settle" policy (spec §9).
    pub fn new_pending(
        task_id: impl Into<String>,
        payer_address: impl Into<String>,
        amount: impl Into<String>,
        network: impl Into<String>,
        transaction: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: task_id.into(),
            payer_address: payer_address.into(),
            amount: amount.into(),
            network: network.into(),
            status: PaymentStatus::Pending,
            transaction,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark as settled.
    pub fn mark_settled(&mut self) {
        self.status = PaymentStatus::Settled;
        self.updated_at = Utc::now();
    }

    /// Mark as refunded.
    pub fn mark_refunded(&mut self) {
        self.status = PaymentStatus::Refunded;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_payment_starts_pending() {
        let p = PaymentRecord::new_pending("task-1", "0xabc", "1000000", "base-sepolia", None);
        assert_eq!(p.status, PaymentStatus::Pending);
    }

    #[test]
    fn settlement_updates_status_and_timestamp() {
        let mut p = PaymentRecord::new_pending("task-1", "0xabc", "1000000", "base-sepolia", None);
        let created = p.updated_at;
        p.mark_settled();
        assert_eq!(p.status, PaymentStatus::Settled);
        assert!(p.updated_at >= created);
    }
}
