//! `request_signing`: pure allocation of a fresh proof-request session.

use crate::circuits;
use crate::deps::SkillDeps;
use chrono::{DateTime, Utc};
use pg_core::error::{ErrorKind, GatewayError};
use pg_core::session::ProofRequestRecord;
use serde::{Deserialize, Serialize};

/// Arguments to `request_signing`.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestSigningArgs {
    /// Target circuit identifier.
    #[serde(rename = "circuitId")]
    pub circuit_id: String,
    /// Privacy-domain scope string.
    pub scope: String,
    /// Circuit-specific country list input.
    #[serde(default, rename = "countryList")]
    pub country_list: Option<Vec<String>>,
    /// Circuit-specific inclusion flag.
    #[serde(default, rename = "isIncluded")]
    pub is_included: Option<bool>,
}

/// Result of `request_signing`.
#[derive(Debug, Serialize)]
pub struct RequestSigningResult {
    #[serde(rename = "requestId")]
    /// Newly generated session id.
    pub request_id: String,
    #[serde(rename = "signingUrl")]
    /// Browser signing URL: `{signPageBaseUrl}/s/{requestId}`.
    pub signing_url: String,
    #[serde(rename = "expiresAt")]
    /// Session expiry time.
    pub expires_at: DateTime<Utc>,
    #[serde(rename = "circuitId")]
    /// Echoed circuit id.
    pub circuit_id: String,
    /// Echoed scope.
    pub scope: String,
}

/// Allocate a fresh session record. No blocking I/O beyond the kv write.
pub async fn request_signing(
    deps: &SkillDeps,
    args: RequestSigningArgs,
) -> Result<RequestSigningResult, GatewayError> {
    let circuit = circuits::find_circuit(&args.circuit_id).ok_or_else(|| {
        GatewayError::invalid_argument(format!("unknown circuitId: {}", args.circuit_id))
    })?;
    if args.scope.trim().is_empty() {
        return Err(GatewayError::invalid_argument("scope must not be blank"));
    }
    if circuit.requires_country_fields && (args.country_list.is_none() || args.is_included.is_none()) {
        return Err(GatewayError::invalid_argument(
            "countryList and isIncluded are required for this circuit",
        ));
    }

    let record = ProofRequestRecord::new(
        args.scope.clone(),
        args.circuit_id.clone(),
        deps.signing_ttl.as_secs() as i64,
        args.country_list,
        args.is_included,
    );
    deps.sessions.create(&record, deps.signing_ttl).await?;

    Ok(RequestSigningResult {
        signing_url: format!("{}/s/{}", deps.sign_page_base_url, record.id),
        request_id: record.id,
        expires_at: record.expires_at,
        circuit_id: args.circuit_id,
        scope: args.scope,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::{PaymentMode, Prover, TeeMode};
    use async_trait::async_trait;
    use pg_kv::InMemoryKvStore;
    use pg_store::{PaymentStore, ProofStore, SessionStore, TaskStore};
    use std::sync::Arc;
    use std::time::Duration;

    struct NullProver;
    #[async_trait]
    impl Prover for NullProver {
        async fn prove(
            &self,
            _circuit_id: &str,
            _params: &crate::deps::ProveParams,
        ) -> Result<crate::deps::ProveOutput, GatewayError> {
            unreachable!("not exercised in this test")
        }
    }

    fn deps() -> SkillDeps {
        let kv: Arc<dyn pg_kv::KvStore> = Arc::new(InMemoryKvStore::new());
        SkillDeps {
            sessions: SessionStore::new(kv.clone()),
            payments: PaymentStore::new(kv.clone()),
            proofs: ProofStore::new(kv.clone()),
            tasks: TaskStore::new(kv),
            sign_page_base_url: "https://sign.example".to_string(),
            signing_ttl: Duration::from_secs(300),
            payment_mode: PaymentMode::Disabled,
            payment_price: "100000".to_string(),
            payment_network: "base-sepolia".to_string(),
            payment_currency: "USDC".to_string(),
            tee_mode: TeeMode::Disabled,
            tee_attestation_enabled: false,
            prover: Arc::new(NullProver),
            tee: None,
            llm: None,
            reputation: None,
            rate_limiter: None,
            proof_cache: None,
        chain_verifier: None,
        }
    }

    #[tokio::test]
    async fn allocates_a_session_with_signing_url() {
        let d = deps();
        let result = request_signing(
            &d,
            RequestSigningArgs {
                circuit_id: "coinbase_attestation".to_string(),
                scope: "e2e.app".to_string(),
                country_list: None,
                is_included: None,
            },
        )
        .await
        .unwrap();
        assert!(result.signing_url.ends_with(&format!("/s/{}", result.request_id)));
        assert_eq!(result.circuit_id, "coinbase_attestation");
    }

    #[tokio::test]
    async fn rejects_unknown_circuit() {
        let d = deps();
        let err = request_signing(
            &d,
            RequestSigningArgs {
                circuit_id: "nope".to_string(),
                scope: "e2e.app".to_string(),
                country_list: None,
                is_included: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn rejects_blank_scope() {
        let d = deps();
        let err = request_signing(
            &d,
            RequestSigningArgs {
                circuit_id: "coinbase_attestation".to_string(),
                scope: "   ".to_string(),
                country_list: None,
                is_included: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn requires_country_fields_for_country_circuit() {
        let d = deps();
        let err = request_signing(
            &d,
            RequestSigningArgs {
                circuit_id: "coinbase_country_attestation".to_string(),
                scope: "e2e.app".to_string(),
                country_list: None,
                is_included: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }
}
