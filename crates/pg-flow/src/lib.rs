//! The flow orchestrator: a coherent macro-state machine sitting above the
//! skill layer, driving `createFlow`/`advanceFlow` for flow-oriented
//! clients.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use pg_core::error::GatewayError;
use pg_core::flow::{FlowPhase, ProofFlow};
use pg_core::session::SessionPhase;
use pg_skills::{
    check_status, generate_proof, request_payment, request_signing, GenerateProofArgs,
    RequestSigningArgs, SkillDeps,
};
use pg_store::FlowStore;
use serde_json::{json, Value};

/// Parameters accepted by `createFlow`, mirroring `request_signing`'s
/// argument contract.
#[derive(Debug, Clone)]
pub struct CreateFlowParams {
    /// Target circuit identifier.
    pub circuit_id: String,
    /// Privacy-domain scope string.
    pub scope: String,
    /// Circuit-specific country list input.
    pub country_list: Option<Vec<String>>,
    /// Circuit-specific inclusion flag.
    pub is_included: Option<bool>,
}

/// Create a new flow: calls `request_signing`, persists the flow in phase
/// `signing`, writes the reverse index, and publishes the initial event.
pub async fn create_flow(
    deps: &SkillDeps,
    flows: &FlowStore,
    params: CreateFlowParams,
) -> Result<ProofFlow, GatewayError> {
    let params_json = json!({
        "circuitId": params.circuit_id,
        "scope": params.scope,
        "countryList": params.country_list,
        "isIncluded": params.is_included,
    });

    let signing = request_signing(
        deps,
        RequestSigningArgs {
            circuit_id: params.circuit_id,
            scope: params.scope,
            country_list: params.country_list,
            is_included: params.is_included,
        },
    )
    .await?;

    let flow = ProofFlow::new(signing.request_id, signing.signing_url, params_json);
    flows.create(&flow).await?;
    flows
        .publish_event(&flow.flow_id, &phase_event(&flow))
        .await?;

    tracing::info!(flow_id = %flow.flow_id, "flow created");
    Ok(flow)
}

/// Idempotent, re-entrant flow advancement. Running this N times between
/// two external events is equivalent to running it once.
pub async fn advance_flow(
    deps: &SkillDeps,
    flows: &FlowStore,
    flow_id: &str,
) -> Result<ProofFlow, GatewayError> {
    let mut flow = flows.get(flow_id).await?;
    if flow.phase.is_terminal() {
        return Ok(flow);
    }

    let status = check_status(deps, &flow.request_id).await?;

    match (status.phase, flow.phase) {
        (SessionPhase::Expired, _) => {
            flow.set_phase(FlowPhase::Expired);
            flows.update(&flow).await?;
            flows.publish_event(&flow.flow_id, &phase_event(&flow)).await?;
        }
        (SessionPhase::Signing, _) => {
            // No-op: still waiting on the caller's signature.
        }
        (SessionPhase::Payment, FlowPhase::Signing) => {
            let payment = request_payment(deps, &flow.request_id).await?;
            flow.payment_url = Some(payment.payment_url);
            flow.set_phase(FlowPhase::Payment);
            flows.update(&flow).await?;
            flows.publish_event(&flow.flow_id, &phase_event(&flow)).await?;
        }
        (SessionPhase::Ready, FlowPhase::Generating) | (SessionPhase::Ready, FlowPhase::Completed) => {
            // Already in flight or done; re-entrant call is a no-op.
        }
        (SessionPhase::Ready, _) => {
            flow.set_phase(FlowPhase::Generating);
            flows.update(&flow).await?;
            flows.publish_event(&flow.flow_id, &phase_event(&flow)).await?;

            match generate_proof(
                deps,
                GenerateProofArgs { request_id: Some(flow.request_id.clone()), ..Default::default() },
            )
            .await
            {
                Ok(result) => {
                    flow.proof_result = Some(serde_json::to_value(&result).unwrap_or(Value::Null));
                    flow.set_phase(FlowPhase::Completed);
                }
                Err(err) => {
                    tracing::warn!(flow_id = %flow.flow_id, code = err.kind.code(), "generate_proof failed");
                    flow.error = Some(err.message.clone());
                    flow.set_phase(FlowPhase::Failed);
                }
            }
            flows.update(&flow).await?;
            flows.publish_event(&flow.flow_id, &phase_event(&flow)).await?;
        }
        (_, _) => {
            // Any other (status, flow-phase) pairing is already
            // consistent; nothing to advance.
        }
    }

    Ok(flow)
}

fn phase_event(flow: &ProofFlow) -> Value {
    json!({
        "type": "phase",
        "flowId": flow.flow_id,
        "phase": flow.phase,
        "paymentUrl": flow.payment_url,
        "error": flow.error,
    })
}
