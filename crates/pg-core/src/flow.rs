//! Flows: the macro-state machine a flow-oriented client (REST `/flow`)
//! observes, chaining the session lifecycle and the proof outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The flow's macro-phase. Terminal phases are `Completed`, `Failed`, and
/// `Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPhase {
    /// Waiting on the caller's signature.
    Signing,
    /// Waiting on payment settlement.
    Payment,
    /// Proof generation in progress.
    Generating,
    /// Terminal: proof generated successfully.
    Completed,
    /// Terminal: generation failed.
    Failed,
    /// Terminal: the bound session expired before reaching `ready`.
    Expired,
}

impl FlowPhase {
    /// Whether this phase is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Expired)
    }
}

/// The orchestrated macro-state machine combining session lifecycle and
/// proof outcome, as exposed by the REST `/flow` family of endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofFlow {
    /// Unique flow id.
    pub flow_id: String,
    /// Copy of the session-creation parameters.
    pub params: Value,
    /// Current phase.
    pub phase: FlowPhase,
    /// The bound session's request id.
    pub request_id: String,
    /// Browser signing URL, assigned at creation.
    pub signing_url: String,
    /// Payment URL, assigned once payment is requested.
    pub payment_url: Option<String>,
    /// The `generate_proof` result, once `completed`.
    pub proof_result: Option<Value>,
    /// A non-leaky error summary, once `failed`.
    pub error: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last phase-transition time.
    pub updated_at: DateTime<Utc>,
}

impl ProofFlow {
    /// Create a freshly created flow in phase `signing`.
    pub fn new(request_id: impl Into<String>, signing_url: impl Into<String>, params: Value) -> Self {
        let now = Utc::now();
        Self {
            flow_id: uuid::Uuid::new_v4().to_string(),
            params,
            phase: FlowPhase::Signing,
            request_id: request_id.into(),
            signing_url: signing_url.into(),
            payment_url: None,
            proof_result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the phase and bump `updated_at`. Does not enforce a transition
    /// table itself; `advanceFlow` in `pg-flow` is responsible for only
    /// calling this with phases the spec's rule table allows.
    pub fn set_phase(&mut self, phase: FlowPhase) {
        self.phase = phase;
        self.updated_at = Utc::now();
    }
}
