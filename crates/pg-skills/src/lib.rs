//! The single canonical skill layer. Every wire protocol the gateway
//! exposes dispatches into these six functions through the shared
//! [`SkillDeps`] bundle; skills never mutate the task store.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod check_status;
mod circuits;
mod deps;
mod generate_proof;
mod get_supported_circuits;
mod request_payment;
mod request_signing;
mod verify_proof;

pub use check_status::{check_status, CheckStatusResult, PaymentStatusView, SigningStatusView};
pub use circuits::{find_circuit, supported_circuits, verifier_address, CircuitInfo};
pub use deps::{
    ChainVerifier, ChainVerifyOutcome, LLMProvider, PaymentMode, ProofCache, ProofCacheKey, Prover,
    ProveOutput, ProveParams, RateLimiter, ReputationSink, SkillDeps, TeeMode, TeeProvider, ToolCall,
    ToolSpec,
};
pub use generate_proof::{generate_proof, GenerateProofArgs, GenerateProofResult};
pub use get_supported_circuits::{get_supported_circuits, SupportedCircuits};
pub use request_payment::{request_payment, RequestPaymentResult};
pub use request_signing::{request_signing, RequestSigningArgs, RequestSigningResult};
pub use verify_proof::{split_hex_to_bytes32, verify_proof, PublicInputs, VerifyProofArgs, VerifyProofResult};

/// The six canonical skill names, in the order they are documented.
pub const SKILL_NAMES: [&str; 6] = [
    "request_signing",
    "check_status",
    "request_payment",
    "generate_proof",
    "verify_proof",
    "get_supported_circuits",
];

/// The skills that never require payment, regardless of payment mode —
/// used by the payment gate's free-skill bypass.
pub const FREE_SKILLS: [&str; 5] = [
    "get_supported_circuits",
    "verify_proof",
    "check_status",
    "request_signing",
    "request_payment",
];
