//! Proof store: persists [`ProofRecord`]s for later URL-based retrieval
//! (`verify_proof` by id, the REST `/verify/{proofId}` route, QR codes).

use crate::keys;
use pg_core::error::{ErrorKind, GatewayError};
use pg_core::proof::ProofRecord;
use pg_kv::KvStore;
use std::sync::Arc;

/// The proof store. Cheap to clone; wraps an `Arc<dyn KvStore>`.
#[derive(Clone)]
pub struct ProofStore {
    kv: Arc<dyn KvStore>,
}

impl ProofStore {
    /// Build a proof store over `kv`.
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Persist a freshly produced proof record with the task TTL (proofs
    /// are kept at least as long as the task that produced them).
    pub async fn create(&self, record: &ProofRecord) -> Result<(), GatewayError> {
        let raw = serde_json::to_string(record)
            .map_err(|e| GatewayError::new(ErrorKind::Internal, "failed to serialize proof record").with_source(e))?;
        self.kv.set(&keys::proof(&record.id), raw, keys::TASK_TTL).await
    }

    /// Load a proof record by id.
    pub async fn get(&self, proof_id: &str) -> Result<ProofRecord, GatewayError> {
        let raw = self
            .kv
            .get(&keys::proof(proof_id))
            .await?
            .ok_or_else(|| GatewayError::new(ErrorKind::NotFound, format!("proof not found: {proof_id}")))?;
        serde_json::from_str(&raw)
            .map_err(|e| GatewayError::new(ErrorKind::Internal, "corrupt proof record").with_source(e))
    }
}
