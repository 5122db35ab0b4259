//! Session store (C3): persists proof-request records.

use crate::keys;
use pg_core::error::{ErrorKind, GatewayError};
use pg_core::session::ProofRequestRecord;
use pg_kv::KvStore;
use std::sync::Arc;
use std::time::Duration;

/// The session store. Cheap to clone; wraps an `Arc<dyn KvStore>`.
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KvStore>,
}

impl SessionStore {
    /// Build a session store over `kv`.
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Persist a freshly created record with TTL `ttl` (the configured
    /// `signingTtlSeconds`, defaulting to [`keys::DEFAULT_SIGNING_TTL`]).
    pub async fn create(&self, record: &ProofRequestRecord, ttl: Duration) -> Result<(), GatewayError> {
        self.write(record, ttl).await
    }

    /// Load a record by request id.
    pub async fn get(&self, request_id: &str) -> Result<ProofRequestRecord, GatewayError> {
        let raw = self
            .kv
            .get(&keys::session(request_id))
            .await?
            .ok_or_else(|| {
                GatewayError::new(
                    ErrorKind::NotFound,
                    format!("session not found: {request_id}"),
                )
            })?;
        serde_json::from_str(&raw).map_err(|e| {
            GatewayError::new(ErrorKind::Internal, "corrupt session record").with_source(e)
        })
    }

    /// Overwrite the record, preserving its remaining TTL window as best
    /// we can (re-applies the default TTL; callers that need a precise
    /// remaining-TTL preserve should track `expires_at` on the record
    /// itself, which this store does not special-case).
    pub async fn update(&self, record: &ProofRequestRecord, ttl: Duration) -> Result<(), GatewayError> {
        self.write(record, ttl).await
    }

    /// One-shot consume: load then delete, returning the record that was
    /// present. The caller (skill layer) treats this pair as one logical
    /// acquisition even though the kv store provides no transaction
    /// (spec §9).
    pub async fn consume(&self, request_id: &str) -> Result<ProofRequestRecord, GatewayError> {
        let record = self.get(request_id).await?;
        self.kv.delete(&keys::session(request_id)).await?;
        Ok(record)
    }

    async fn write(&self, record: &ProofRequestRecord, ttl: Duration) -> Result<(), GatewayError> {
        let raw = serde_json::to_string(record).map_err(|e| {
            GatewayError::new(ErrorKind::Internal, "failed to serialize session record")
                .with_source(e)
        })?;
        self.kv.set(&keys::session(&record.id), raw, ttl).await
    }
}
