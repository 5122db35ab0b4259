//! Payment store: persists [`PaymentRecord`]s and the `task` / `status`
//! indexes the settlement worker reconciles against.

use crate::keys;
use pg_core::error::{ErrorKind, GatewayError};
use pg_core::payment::{PaymentRecord, PaymentStatus};
use pg_kv::KvStore;
use std::sync::Arc;

/// The payment store. Cheap to clone; wraps an `Arc<dyn KvStore>`.
#[derive(Clone)]
pub struct PaymentStore {
    kv: Arc<dyn KvStore>,
}

impl PaymentStore {
    /// Build a payment store over `kv`.
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Persist a freshly created record, index it by task and status, and
    /// enqueue it for the settlement worker (every new record starts
    /// `pending`).
    pub async fn create(&self, record: &PaymentRecord) -> Result<(), GatewayError> {
        self.write(record).await?;
        self.kv
            .set(
                &keys::payment_task_index(&record.task_id),
                record.id.clone(),
                keys::PAYMENT_TTL,
            )
            .await?;
        self.index_by_status(record).await?;
        self.enqueue_pending(&record.id).await
    }

    /// Load a payment record by id.
    pub async fn get(&self, id: &str) -> Result<PaymentRecord, GatewayError> {
        let raw = self
            .kv
            .get(&keys::payment(id))
            .await?
            .ok_or_else(|| GatewayError::new(ErrorKind::NotFound, format!("payment not found: {id}")))?;
        serde_json::from_str(&raw).map_err(|e| {
            GatewayError::new(ErrorKind::Internal, "corrupt payment record").with_source(e)
        })
    }

    /// Look up the payment id bound to a task, via the reverse index.
    pub async fn get_by_task(&self, task_id: &str) -> Result<Option<PaymentRecord>, GatewayError> {
        let Some(payment_id) = self.kv.get(&keys::payment_task_index(task_id)).await? else {
            return Ok(None);
        };
        Ok(Some(self.get(&payment_id).await?))
    }

    /// Mark settled and move the status index entry.
    pub async fn mark_settled(&self, id: &str) -> Result<PaymentRecord, GatewayError> {
        let mut record = self.get(id).await?;
        record.mark_settled();
        self.write(&record).await?;
        self.index_by_status(&record).await?;
        Ok(record)
    }

    /// Mark refunded and move the status index entry.
    pub async fn mark_refunded(&self, id: &str) -> Result<PaymentRecord, GatewayError> {
        let mut record = self.get(id).await?;
        record.mark_refunded();
        self.write(&record).await?;
        self.index_by_status(&record).await?;
        Ok(record)
    }

    /// Peek the most recently indexed pending payment id, if any. The
    /// status index is a single key overwritten on every transition, so
    /// this is a convenience lookup for tests and tooling, not an
    /// enumeration; the settlement worker uses `enqueue_pending` /
    /// `dequeue_pending` instead.
    pub async fn pending_index(&self) -> Result<Option<String>, GatewayError> {
        self.kv
            .get(&keys::payment_status_index(status_str(PaymentStatus::Pending)))
            .await
    }

    /// Push a payment id onto the FIFO pending queue. Called by `create`;
    /// exposed separately so the settlement worker can re-enqueue a
    /// record after a transient facilitator failure.
    pub async fn enqueue_pending(&self, id: &str) -> Result<(), GatewayError> {
        self.kv.list_push_back(keys::payment_pending_queue(), id.to_string()).await
    }

    /// Pop the next payment id off the FIFO pending queue, or `None` if
    /// it's empty. The settlement worker re-checks the record's current
    /// status before acting, since a dequeued id may have been settled or
    /// refunded by another path since it was enqueued.
    pub async fn dequeue_pending(&self) -> Result<Option<String>, GatewayError> {
        self.kv.list_pop_front(keys::payment_pending_queue()).await
    }

    async fn index_by_status(&self, record: &PaymentRecord) -> Result<(), GatewayError> {
        self.kv
            .set(
                &keys::payment_status_index(status_str(record.status)),
                record.id.clone(),
                keys::PAYMENT_TTL,
            )
            .await
    }

    async fn write(&self, record: &PaymentRecord) -> Result<(), GatewayError> {
        let raw = serde_json::to_string(record).map_err(|e| {
            GatewayError::new(ErrorKind::Internal, "failed to serialize payment record").with_source(e)
        })?;
        self.kv.set(&keys::payment(&record.id), raw, keys::PAYMENT_TTL).await
    }
}

fn status_str(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Pending => "pending",
        PaymentStatus::Settled => "settled",
        PaymentStatus::Refunded => "refunded",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pg_kv::InMemoryKvStore;

    fn store() -> PaymentStore {
        PaymentStore::new(Arc::new(InMemoryKvStore::new()))
    }

    #[tokio::test]
    async fn create_then_get_by_task_round_trips() {
        let s = store();
        let record = PaymentRecord::new_pending("task-1", "0xabc", "1000000", "base-sepolia", None);
        s.create(&record).await.unwrap();
        let found = s.get_by_task("task-1").await.unwrap().unwrap();
        assert_eq!(found.id, record.id);
    }

    #[tokio::test]
    async fn mark_settled_updates_status_and_index() {
        let s = store();
        let record = PaymentRecord::new_pending("task-1", "0xabc", "1000000", "base-sepolia", None);
        s.create(&record).await.unwrap();
        let settled = s.mark_settled(&record.id).await.unwrap();
        assert_eq!(settled.status, PaymentStatus::Settled);
    }

    #[tokio::test]
    async fn get_unknown_payment_is_not_found() {
        let s = store();
        let err = s.get("nope").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn create_enqueues_onto_pending_queue_in_order() {
        let s = store();
        let a = PaymentRecord::new_pending("task-a", "0xabc", "1000000", "base-sepolia", None);
        let b = PaymentRecord::new_pending("task-b", "0xdef", "2000000", "base-sepolia", None);
        s.create(&a).await.unwrap();
        s.create(&b).await.unwrap();
        assert_eq!(s.dequeue_pending().await.unwrap().unwrap(), a.id);
        assert_eq!(s.dequeue_pending().await.unwrap().unwrap(), b.id);
        assert!(s.dequeue_pending().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn re_enqueue_after_transient_failure_is_seen_again() {
        let s = store();
        let a = PaymentRecord::new_pending("task-a", "0xabc", "1000000", "base-sepolia", None);
        s.create(&a).await.unwrap();
        let id = s.dequeue_pending().await.unwrap().unwrap();
        s.enqueue_pending(&id).await.unwrap();
        assert_eq!(s.dequeue_pending().await.unwrap().unwrap(), id);
    }
}
