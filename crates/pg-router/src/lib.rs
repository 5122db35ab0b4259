//! The skill router: resolves an inbound message to a skill name plus
//! parameters, either from an explicit data-part tag or, failing that,
//! from free-form text via a tool-call-required LLM completion.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use pg_core::error::{ErrorKind, GatewayError};
use pg_core::message::Message;
use pg_skills::{LLMProvider, ToolSpec, SKILL_NAMES};
use serde_json::{json, Map, Value};
use std::time::Duration;

const ROUTER_DEADLINE: Duration = Duration::from_secs(30);

/// The router's system prompt for the tool-call-required completion.
pub const ROUTER_SYSTEM_PROMPT: &str = "You are a routing function for a zero-knowledge proof \
gateway. Given the user's message, choose exactly one tool call matching \
their intent. Never reply with plain text.";

/// Which resolution path produced a [`ResolvedSkill`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSource {
    /// An explicit `skill` tag on a data part.
    Data,
    /// Free-form text, resolved via the LLM.
    Text,
}

/// The outcome of `resolve_skill`.
#[derive(Debug, Clone)]
pub struct ResolvedSkill {
    /// The resolved skill name.
    pub skill: String,
    /// The skill's parameters, as a JSON object.
    pub params: Map<String, Value>,
    /// Which path resolved this skill.
    pub source: RouteSource,
}

/// Resolve `message` to a skill, following the rule order: data-part tag,
/// then (if an LLM is configured) a tool-call-required completion over
/// the concatenated text. Fails `NotRoutable` if neither path succeeds.
pub async fn resolve_skill(
    message: &Message,
    llm: Option<&dyn LLMProvider>,
) -> Result<ResolvedSkill, GatewayError> {
    if let Some((skill, obj)) = message.skill_directive() {
        let mut params = obj.clone();
        params.remove("skill");
        return Ok(ResolvedSkill { skill: skill.to_string(), params, source: RouteSource::Data });
    }

    let text = message.concatenated_text();
    if text.trim().is_empty() {
        return Err(GatewayError::new(ErrorKind::NotRoutable, "no routable content"));
    }

    let llm = llm.ok_or_else(|| {
        GatewayError::new(ErrorKind::NotRoutable, "text routing requires an LLM provider")
    })?;

    let tools = tool_catalog();
    let call = tokio::time::timeout(ROUTER_DEADLINE, llm.resolve_tool_call(ROUTER_SYSTEM_PROMPT, &text, &tools))
        .await
        .map_err(|_| GatewayError::new(ErrorKind::UpstreamTimeout, "skill router LLM call timed out"))??;

    let params = call.arguments.as_object().cloned().unwrap_or_default();
    Ok(ResolvedSkill { skill: call.name, params, source: RouteSource::Text })
}

/// Override `requestId` in a resolved skill's params from the session's
/// context→request index, when one is bound. Text-inferred calls are
/// always overridden (LLMs are observed to hallucinate placeholder ids);
/// data-part calls are overridden only when `requestId` is absent.
pub fn override_request_id(resolved: &mut ResolvedSkill, context_request_id: Option<&str>) {
    if !matches!(resolved.skill.as_str(), "check_status" | "request_payment" | "generate_proof") {
        return;
    }
    let Some(ctx_id) = context_request_id else { return };
    match resolved.source {
        RouteSource::Text => {
            resolved.params.insert("requestId".to_string(), Value::String(ctx_id.to_string()));
        }
        RouteSource::Data => {
            resolved.params.entry("requestId".to_string()).or_insert_with(|| Value::String(ctx_id.to_string()));
        }
    }
}

/// The tool catalog offered to the LLM, one entry per canonical skill.
pub fn tool_catalog() -> Vec<ToolSpec> {
    SKILL_NAMES
        .iter()
        .map(|&name| ToolSpec { name: name.to_string(), description: tool_description(name).to_string(), parameters: tool_parameters(name) })
        .collect()
}

fn tool_description(skill: &str) -> &'static str {
    match skill {
        "request_signing" => "Allocate a new proof-request session and signing URL.",
        "check_status" => "Check the signing/payment status of a proof-request session.",
        "request_payment" => "Request payment for a signed proof-request session.",
        "generate_proof" => "Generate a zero-knowledge proof, in session or direct mode.",
        "verify_proof" => "Verify a proof against the on-chain verifier contract.",
        "get_supported_circuits" => "List supported circuits and their verifier addresses.",
        _ => "",
    }
}

fn tool_parameters(skill: &str) -> Value {
    match skill {
        "request_signing" => json!({
            "type": "object",
            "properties": {
                "circuitId": {"type": "string"},
                "scope": {"type": "string"},
                "countryList": {"type": "array", "items": {"type": "string"}},
                "isIncluded": {"type": "boolean"},
            },
            "required": ["circuitId", "scope"],
        }),
        "check_status" | "request_payment" => json!({
            "type": "object",
            "properties": {"requestId": {"type": "string"}},
            "required": ["requestId"],
        }),
        "generate_proof" => json!({
            "type": "object",
            "properties": {
                "requestId": {"type": "string"},
                "address": {"type": "string"},
                "signature": {"type": "string"},
                "scope": {"type": "string"},
                "circuitId": {"type": "string"},
                "countryList": {"type": "array", "items": {"type": "string"}},
                "isIncluded": {"type": "boolean"},
            },
        }),
        "verify_proof" => json!({
            "type": "object",
            "properties": {
                "circuitId": {"type": "string"},
                "proof": {"type": "string"},
                "publicInputs": {},
                "chainId": {"type": "string"},
            },
            "required": ["circuitId", "proof", "publicInputs"],
        }),
        "get_supported_circuits" => json!({
            "type": "object",
            "properties": {"chainId": {"type": "string"}},
        }),
        _ => json!({"type": "object"}),
    }
}
