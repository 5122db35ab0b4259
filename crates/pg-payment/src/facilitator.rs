//! HTTP client for the external payment facilitator.

use crate::types::{PaymentPayload, SettleResponse, VerifyResponse};
use pg_core::error::{ErrorKind, GatewayError};
use std::time::Duration;

/// Configuration for reaching the facilitator.
#[derive(Debug, Clone)]
pub struct FacilitatorConfig {
    /// Base URL, e.g. `https://facilitator.example`.
    pub url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl FacilitatorConfig {
    /// Build a config with the default 10-second timeout.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Builder-style timeout override.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Thin HTTP client over the facilitator's `verify`/`settle` endpoints.
pub struct FacilitatorClient {
    config: FacilitatorConfig,
    http: reqwest::Client,
}

impl FacilitatorClient {
    /// Build a client for `config`.
    pub fn new(config: FacilitatorConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                GatewayError::new(ErrorKind::Internal, "failed to build facilitator client")
                    .with_source(e)
            })?;
        Ok(Self { config, http })
    }

    /// Ask the facilitator whether `payload` verifies, without
    /// submitting it on-chain.
    pub async fn verify(&self, payload: &PaymentPayload) -> Result<VerifyResponse, GatewayError> {
        let url = format!("{}/verify", self.config.url.trim_end_matches('/'));
        let body = serde_json::json!({
            "paymentPayload": payload,
            "paymentRequirements": payload.accepted,
        });
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(upstream_error)?;
        resp.json::<VerifyResponse>().await.map_err(upstream_error)
    }

    /// Ask the facilitator to settle `payload` on-chain.
    pub async fn settle(&self, payload: &PaymentPayload) -> Result<SettleResponse, GatewayError> {
        let url = format!("{}/settle", self.config.url.trim_end_matches('/'));
        let body = serde_json::json!({
            "paymentPayload": payload,
            "paymentRequirements": payload.accepted,
        });
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(upstream_error)?;
        resp.json::<SettleResponse>().await.map_err(upstream_error)
    }
}

fn upstream_error(e: reqwest::Error) -> GatewayError {
    let kind = if e.is_timeout() {
        ErrorKind::UpstreamTimeout
    } else {
        ErrorKind::UpstreamFailure
    };
    GatewayError::new(kind, "facilitator request failed").with_source(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExactEvmPayload, PaymentExtra, PaymentRequirements, ResourceDescriptor, TransferWithAuthorization};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_payload() -> PaymentPayload {
        PaymentPayload {
            x402_version: 1,
            resource: "https://gw.example/api/v1/proofs".to_string(),
            accepted: PaymentRequirements {
                scheme: "exact".to_string(),
                network: "base-sepolia".to_string(),
                amount: "10000".to_string(),
                asset: "0xusdc".to_string(),
                pay_to: "0xpayto".to_string(),
                max_timeout_seconds: 60,
                extra: PaymentExtra {
                    name: "proofport-gateway".to_string(),
                    version: "0.1.0".to_string(),
                },
                resource: ResourceDescriptor {
                    url: "https://gw.example/api/v1/proofs".to_string(),
                    description: "Generate a proof".to_string(),
                    mime_type: "application/json".to_string(),
                },
            },
            payload: ExactEvmPayload {
                signature: "0xsig".to_string(),
                authorization: TransferWithAuthorization {
                    from: "0xfrom".to_string(),
                    to: "0xpayto".to_string(),
                    value: "10000".to_string(),
                    valid_after: 0,
                    valid_before: 9_999_999_999,
                    nonce: "0xnonce".to_string(),
                },
            },
        }
    }

    #[tokio::test]
    async fn settle_success_parses_transaction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "transaction": "0xabc123",
                "network": "base-sepolia",
            })))
            .mount(&server)
            .await;

        let client = FacilitatorClient::new(FacilitatorConfig::new(server.uri())).unwrap();
        let result = client.settle(&sample_payload()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.transaction.unwrap(), "0xabc123");
    }

    #[tokio::test]
    async fn settle_failure_parses_error_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "errorReason": "insufficient_funds",
                "errorMessage": "payer balance too low",
            })))
            .mount(&server)
            .await;

        let client = FacilitatorClient::new(FacilitatorConfig::new(server.uri())).unwrap();
        let result = client.settle(&sample_payload()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error_reason.unwrap(), "insufficient_funds");
    }

    #[tokio::test]
    async fn verify_reports_invalid_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "isValid": false,
                "invalidReason": "signature_mismatch",
            })))
            .mount(&server)
            .await;

        let client = FacilitatorClient::new(FacilitatorConfig::new(server.uri())).unwrap();
        let result = client.verify(&sample_payload()).await.unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.invalid_reason.unwrap(), "signature_mismatch");
    }
}
