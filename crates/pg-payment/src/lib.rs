//! EIP-3009 / x402-style payment types and the facilitator HTTP client.
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod facilitator;
pub mod types;

pub use facilitator::{FacilitatorClient, FacilitatorConfig};
pub use types::{
    ExactEvmPayload, PaymentExtra, PaymentPayload, PaymentPayloadError, PaymentRequirements,
    ResourceDescriptor, SettleResponse, TransferWithAuthorization, VerifyResponse, SCHEME_EXACT,
};
