//! x402-style wire types: the 402 challenge body, the EIP-712
//! `TransferWithAuthorization` payload, and the facilitator's responses.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// The payment scheme this gateway speaks. Only `exact` (a fixed-amount
/// transfer) is implemented; the field exists so clients can distinguish
/// future schemes.
pub const SCHEME_EXACT: &str = "exact";

/// Resource metadata embedded in the 402 challenge, identifying what the
/// caller is paying for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// The resource URL (the route that returned 402).
    pub url: String,
    /// Human-readable description.
    pub description: String,
    /// MIME type of the resource's successful response.
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

/// Vendor-extension metadata carried in the 402 challenge's `extra` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentExtra {
    /// Gateway name.
    pub name: String,
    /// Gateway protocol version.
    pub version: String,
}

/// The machine-readable payment requirements sent back to a caller that
/// hit a gated route without a valid payment (spec §4.11, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequirements {
    /// Always `"exact"` today.
    pub scheme: String,
    /// Network identifier, e.g. `"base-sepolia"`.
    pub network: String,
    /// Required amount, in the smallest unit of `asset`, as a decimal
    /// integer string.
    pub amount: String,
    /// The asset contract address (USDC on `network`).
    pub asset: String,
    /// The address payment must be sent to.
    #[serde(rename = "payTo")]
    pub pay_to: String,
    /// Maximum seconds the caller has to complete payment before the
    /// challenge expires.
    #[serde(rename = "maxTimeoutSeconds")]
    pub max_timeout_seconds: u64,
    /// Vendor-extension metadata.
    pub extra: PaymentExtra,
    /// The gated resource this challenge protects.
    pub resource: ResourceDescriptor,
}

impl PaymentRequirements {
    /// Serialize to the exact JSON shape carried by the 402 challenge
    /// header.
    pub fn to_header_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// An EIP-3009 `TransferWithAuthorization` over the USDC contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferWithAuthorization {
    /// Payer address.
    pub from: String,
    /// Payee address (must match `PaymentRequirements::pay_to`).
    pub to: String,
    /// Amount, in the smallest unit of the asset, as a decimal integer
    /// string.
    pub value: String,
    /// Unix timestamp (seconds) after which the authorization is valid.
    #[serde(rename = "validAfter")]
    pub valid_after: i64,
    /// Unix timestamp (seconds) before which the authorization is valid.
    #[serde(rename = "validBefore")]
    pub valid_before: i64,
    /// Random 32-byte nonce, hex-encoded.
    pub nonce: String,
}

impl TransferWithAuthorization {
    /// Whether `now` (unix seconds) falls within `[valid_after,
    /// valid_before)`.
    pub fn is_valid_at(&self, now: i64) -> bool {
        now >= self.valid_after && now < self.valid_before
    }
}

/// The signed authorization plus its EIP-712 signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExactEvmPayload {
    /// Hex-encoded EIP-712 signature over `authorization`.
    pub signature: String,
    /// The signed authorization.
    pub authorization: TransferWithAuthorization,
}

/// The full payload a caller retries a gated request with, carried
/// base64-encoded in the `PAYMENT-SIGNATURE`/`X-PAYMENT` header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPayload {
    /// x402 protocol version; `1` today.
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
    /// The resource URL this payment was produced for.
    pub resource: String,
    /// The payment requirements the caller is satisfying.
    pub accepted: PaymentRequirements,
    /// The signed authorization.
    pub payload: ExactEvmPayload,
}

impl PaymentPayload {
    /// Decode from the base64 body of a `PAYMENT-SIGNATURE`/`X-PAYMENT`
    /// header value.
    pub fn from_base64(s: &str) -> Result<Self, PaymentPayloadError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|_| PaymentPayloadError::Malformed)?;
        serde_json::from_slice(&bytes).map_err(|_| PaymentPayloadError::Malformed)
    }

    /// Encode as the base64 body for a header value.
    pub fn to_base64(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

/// Error decoding a [`PaymentPayload`] from a header value.
#[derive(Debug, thiserror::Error)]
pub enum PaymentPayloadError {
    /// The header value was not valid base64-encoded JSON matching the
    /// expected shape.
    #[error("malformed payment payload")]
    Malformed,
}

/// The facilitator's response to a `verify` call, run ahead of settlement
/// to fail fast on malformed authorizations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// Whether the authorization verifies.
    #[serde(rename = "isValid")]
    pub is_valid: bool,
    /// A machine-readable reason, present when `is_valid` is `false`.
    #[serde(rename = "invalidReason", skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
    /// The recovered payer address, when verification succeeds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

/// The facilitator's response to a `settle` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleResponse {
    /// Whether settlement succeeded.
    pub success: bool,
    /// On-chain transaction hash, when `success` is `true`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    /// Network the transaction landed on, when `success` is `true`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    /// Human-readable error message, when `success` is `false`.
    #[serde(rename = "errorMessage", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Machine-readable error reason, when `success` is `false`.
    #[serde(rename = "errorReason", skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: SCHEME_EXACT.to_string(),
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
        }
    }

    #[test]
    fn challenge_header_json_uses_wire_field_names() {
        let v = sample_requirements().to_header_json();
        assert_eq!(v["payTo"], "0xpayto");
        assert_eq!(v["maxTimeoutSeconds"], 60);
        assert_eq!(v["extra"]["name"], "proofport-gateway");
        assert_eq!(v["resource"]["mimeType"], "application/json");
    }

    #[test]
    fn payment_payload_base64_round_trips() {
        let payload = PaymentPayload {
            x402_version: 1,
            resource: "https://gw.example/api/v1/proofs".to_string(),
            accepted: sample_requirements(),
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
        };
        let encoded = payload.to_base64();
        let decoded = PaymentPayload::from_base64(&encoded).unwrap();
        assert_eq!(decoded.payload.authorization.from, "0xfrom");
        assert_eq!(decoded.accepted.pay_to, "0xpayto");
    }

    #[test]
    fn malformed_header_value_is_rejected() {
        let err = PaymentPayload::from_base64("not-base64-json!!").unwrap_err();
        assert!(matches!(err, PaymentPayloadError::Malformed));
    }

    #[test]
    fn authorization_validity_window() {
        let auth = TransferWithAuthorization {
            from: "0xfrom".to_string(),
            to: "0xto".to_string(),
            value: "1".to_string(),
            valid_after: 100,
            valid_before: 200,
            nonce: "0xn".to_string(),
        };
        assert!(!auth.is_valid_at(50));
        assert!(auth.is_valid_at(150));
        assert!(!auth.is_valid_at(200));
    }
}
