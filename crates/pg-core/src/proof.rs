//! Stored proof records: the durable form of a `generate_proof` result,
//! kept around so `verify_proof`/the REST `/verify/{proofId}` route and QR
//! codes can retrieve it by id later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A completed proof, stored under a fresh `proofId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofRecord {
    /// Unique proof id.
    pub id: String,
    /// Circuit the proof was generated against.
    pub circuit_id: String,
    /// Hex-encoded proof blob.
    pub proof: String,
    /// Hex-encoded public inputs, one entry per 32-byte word.
    pub public_inputs: Vec<String>,
    /// Hex-encoded nullifier.
    pub nullifier: String,
    /// Hex-encoded signal hash.
    pub signal_hash: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl ProofRecord {
    /// Build a fresh record with a generated id.
    pub fn new(
        circuit_id: impl Into<String>,
        proof: impl Into<String>,
        public_inputs: Vec<String>,
        nullifier: impl Into<String>,
        signal_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            circuit_id: circuit_id.into(),
            proof: proof.into(),
            public_inputs,
            nullifier: nullifier.into(),
            signal_hash: signal_hash.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_gets_a_fresh_id() {
        let a = ProofRecord::new("coinbase_attestation", "0xaa", vec!["0x01".into()], "0xbb", "0xcc");
        let b = ProofRecord::new("coinbase_attestation", "0xaa", vec!["0x01".into()], "0xbb", "0xcc");
        assert_ne!(a.id, b.id);
    }
}
