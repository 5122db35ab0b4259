//! Synchronous skill dispatch, shared by the MCP `tools/call` route and the
//! chat endpoint's tool-calling loop — both invoke a skill directly rather
//! than through the task queue. Grounded on `pg-worker`'s dispatch match,
//! generalized from `BTreeMap<String, Value>` task params to a JSON object
//! since neither caller here goes through a persisted `Task`.

use pg_core::error::{ErrorKind, GatewayError};
use pg_skills::{
    check_status, generate_proof, get_supported_circuits, request_payment, request_signing,
    verify_proof, GenerateProofArgs, RequestSigningArgs, SkillDeps, VerifyProofArgs,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Dispatch `skill` with `params` (a JSON object) into the skill layer,
/// returning its result as a JSON value.
pub async fn dispatch(deps: &SkillDeps, skill: &str, params: &Map<String, Value>) -> Result<Value, GatewayError> {
    match skill {
        "request_signing" => {
            let args: RequestSigningArgs = parse_args(params)?;
            to_value(request_signing(deps, args).await?)
        }
        "check_status" => {
            let request_id = required_string(params, "requestId")?;
            to_value(check_status(deps, &request_id).await?)
        }
        "request_payment" => {
            let request_id = required_string(params, "requestId")?;
            to_value(request_payment(deps, &request_id).await?)
        }
        "generate_proof" => {
            let args: GenerateProofArgs = parse_args(params)?;
            to_value(generate_proof(deps, args).await?)
        }
        "verify_proof" => {
            let args: VerifyProofArgs = parse_args(params)?;
            to_value(verify_proof(deps, args).await?)
        }
        "get_supported_circuits" => {
            let chain_id = params.get("chainId").and_then(Value::as_str).map(str::to_string);
            to_value(get_supported_circuits(chain_id))
        }
        other => Err(GatewayError::new(ErrorKind::NotRoutable, format!("unknown skill: {other}"))),
    }
}

fn parse_args<T: DeserializeOwned>(params: &Map<String, Value>) -> Result<T, GatewayError> {
    serde_json::from_value(Value::Object(params.clone()))
        .map_err(|e| GatewayError::new(ErrorKind::InvalidArgument, "malformed skill params").with_source(e))
}

fn required_string(params: &Map<String, Value>, key: &str) -> Result<String, GatewayError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GatewayError::invalid_argument(format!("missing required param: {key}")))
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, GatewayError> {
    serde_json::to_value(value)
        .map_err(|e| GatewayError::new(ErrorKind::Internal, "failed to serialize skill result").with_source(e))
}
