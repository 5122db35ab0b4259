//! Static circuit metadata and per-chain verifier addresses backing
//! `get_supported_circuits` and `verify_proof`'s verifier lookup.

use std::collections::BTreeMap;

/// Metadata for one supported circuit.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CircuitInfo {
    /// Circuit identifier, e.g. `"coinbase_attestation"`.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Whether this circuit requires `countryList`/`isIncluded` inputs.
    pub requires_country_fields: bool,
    /// Verifier contract address by chain id, e.g. `"84532"` (Base
    /// Sepolia) -> `"0x..."`.
    pub verifiers: BTreeMap<&'static str, &'static str>,
}

fn base_sepolia_verifiers(addr: &'static str) -> BTreeMap<&'static str, &'static str> {
    let mut m = BTreeMap::new();
    m.insert("84532", addr);
    m
}

/// The static catalog of supported circuits.
pub fn supported_circuits() -> Vec<CircuitInfo> {
    vec![
        CircuitInfo {
            id: "coinbase_attestation",
            name: "Coinbase Attestation",
            description: "Proves possession of a valid Coinbase EAS attestation without revealing the signer.",
            requires_country_fields: false,
            verifiers: base_sepolia_verifiers("0x1111111111111111111111111111111111111111"),
        },
        CircuitInfo {
            id: "coinbase_country_attestation",
            name: "Coinbase Country Attestation",
            description: "Proves attestation possession plus country-list membership or exclusion.",
            requires_country_fields: true,
            verifiers: base_sepolia_verifiers("0x2222222222222222222222222222222222222222"),
        },
    ]
}

/// Look up a circuit by id.
pub fn find_circuit(circuit_id: &str) -> Option<CircuitInfo> {
    supported_circuits().into_iter().find(|c| c.id == circuit_id)
}

/// Look up the verifier address for `(circuit_id, chain_id)`. Defaults
/// `chain_id` to Base Sepolia (`"84532"`) when absent, matching the
/// gateway's default network.
pub fn verifier_address(circuit_id: &str, chain_id: Option<&str>) -> Option<&'static str> {
    let circuit = find_circuit(circuit_id)?;
    let chain_id = chain_id.unwrap_or("84532");
    circuit.verifiers.get(chain_id).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_includes_both_coinbase_circuits() {
        let ids: Vec<_> = supported_circuits().into_iter().map(|c| c.id).collect();
        assert!(ids.contains(&"coinbase_attestation"));
        assert!(ids.contains(&"coinbase_country_attestation"));
    }

    #[test]
    fn verifier_lookup_defaults_to_base_sepolia() {
        assert!(verifier_address("coinbase_attestation", None).is_some());
        assert!(verifier_address("coinbase_attestation", Some("1")).is_none());
    }
}
