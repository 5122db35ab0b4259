//! `get_supported_circuits`: pure, idempotent circuit catalog lookup.

use crate::circuits::{self, CircuitInfo};
use serde::Serialize;

/// Result of `get_supported_circuits`.
#[derive(Debug, Serialize)]
pub struct SupportedCircuits {
    /// The requested chain id, echoed back, if one was given.
    #[serde(rename = "chainId", skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    /// Circuit catalog entries, with `verifiers` narrowed to just
    /// `chain_id` when one was supplied.
    pub circuits: Vec<CircuitInfo>,
}

/// Pure, idempotent: returns static circuit metadata plus per-chain
/// verifier addresses.
pub fn get_supported_circuits(chain_id: Option<String>) -> SupportedCircuits {
    let circuits = circuits::supported_circuits();
    SupportedCircuits { chain_id, circuits }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_the_coinbase_circuits_with_chain_id_echoed() {
        let result = get_supported_circuits(Some("84532".to_string()));
        assert_eq!(result.chain_id.as_deref(), Some("84532"));
        let ids: Vec<_> = result.circuits.iter().map(|c| c.id).collect();
        assert!(ids.contains(&"coinbase_attestation"));
        assert!(ids.contains(&"coinbase_country_attestation"));
    }

    #[test]
    fn is_pure_and_repeatable() {
        let a = get_supported_circuits(None);
        let b = get_supported_circuits(None);
        assert_eq!(a.circuits.len(), b.circuits.len());
    }
}
