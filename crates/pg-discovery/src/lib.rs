//! Builds the gateway's `.well-known/` discovery documents: the A2A v0.3
//! Agent Card, its `agent-card.json` alias, the OASF descriptor, and the
//! MCP endpoint advertisement.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use pg_payment::types::PaymentExtra;
use pg_router::tool_catalog;
use pg_skills::{FREE_SKILLS, SKILL_NAMES};
use serde::Serialize;
use serde_json::Value;

/// The on-chain identity registration exposed in `identity.erc8004`, when
/// the gateway is configured with one.
#[derive(Debug, Clone, Serialize)]
pub struct Erc8004Identity {
    /// The ERC-8004 identity registry contract address.
    #[serde(rename = "contractAddress")]
    pub contract_address: String,
    /// The chain id the registry is deployed on, as a decimal string.
    #[serde(rename = "chainId")]
    pub chain_id: String,
    /// The token id identifying this agent within the registry.
    #[serde(rename = "tokenId")]
    pub token_id: String,
}

/// The `identity` block, present only when an on-chain registration is
/// configured.
#[derive(Debug, Clone, Serialize)]
pub struct IdentityBlock {
    /// The ERC-8004 registration.
    pub erc8004: Erc8004Identity,
}

/// The x402 security scheme advertised in `securitySchemes.x402`, derived
/// from the gateway's own payment configuration rather than a per-request
/// 402 challenge (that shape is `pg_payment::types::PaymentRequirements`,
/// which also carries a resource descriptor a discovery document has no
/// single resource for).
#[derive(Debug, Clone, Serialize)]
pub struct X402SecurityScheme {
    /// Always `"exact"` today.
    pub scheme: String,
    /// Network identifier, e.g. `"base-sepolia"`.
    pub network: String,
    /// The asset contract address (USDC on `network`).
    pub asset: String,
    /// The address payment must be sent to.
    #[serde(rename = "payTo")]
    pub pay_to: String,
    /// Maximum seconds a caller has to complete payment before a
    /// challenge expires.
    #[serde(rename = "maxTimeoutSeconds")]
    pub max_timeout_seconds: u64,
    /// Vendor-extension metadata.
    pub extra: PaymentExtra,
}

/// The `securitySchemes` object. `x402` is omitted from the serialized
/// JSON when the gateway runs with payment disabled.
#[derive(Debug, Clone, Serialize)]
pub struct SecuritySchemes {
    /// The x402 scheme, when payment is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x402: Option<X402SecurityScheme>,
}

/// A2A capability flags advertised in the agent card.
#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    /// Whether `tasks/get` exposes full state transition history.
    #[serde(rename = "stateTransitionHistory")]
    pub state_transition_history: bool,
}

/// One entry in the card's `skills` array.
#[derive(Debug, Clone, Serialize)]
pub struct SkillCard {
    /// The skill's canonical name, used as its id.
    pub id: String,
    /// Same as `id`; A2A skill entries carry both fields.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// `"free"` or `"paid"`, depending on whether the payment gate
    /// requires settlement before this skill runs.
    pub tags: Vec<String>,
}

/// An A2A v0.3 Agent Card. Served at both `/.well-known/agent.json` and
/// `/.well-known/agent-card.json`.
#[derive(Debug, Clone, Serialize)]
pub struct AgentCard {
    /// The gateway's display name.
    pub name: String,
    /// The gateway's description.
    pub description: String,
    /// The gateway's base URL.
    pub url: String,
    /// Always `"0.3.0"`.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Always `"JSONRPC"`; this gateway speaks A2A over JSON-RPC only.
    #[serde(rename = "preferredTransport")]
    pub preferred_transport: String,
    /// Capability flags.
    pub capabilities: Capabilities,
    /// Security schemes a caller may need to satisfy.
    #[serde(rename = "securitySchemes")]
    pub security_schemes: SecuritySchemes,
    /// The skill catalog.
    pub skills: Vec<SkillCard>,
    /// On-chain identity registration, when configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityBlock>,
}

/// The OASF descriptor served at `/.well-known/oasf.json`.
#[derive(Debug, Clone, Serialize)]
pub struct OasfDescriptor {
    /// OASF schema version this descriptor conforms to.
    #[serde(rename = "schemaVersion")]
    pub schema_version: String,
    /// The gateway's display name.
    pub name: String,
    /// The gateway's description.
    pub description: String,
    /// On-chain identity registration, when configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityBlock>,
}

/// One tool entry in the MCP advertisement.
#[derive(Debug, Clone, Serialize)]
pub struct McpTool {
    /// The tool (skill) name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's arguments.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// The MCP advertisement served at `/.well-known/mcp.json`.
#[derive(Debug, Clone, Serialize)]
pub struct McpDiscovery {
    /// The MCP JSON-RPC endpoint URL.
    pub endpoint: String,
    /// The tool catalog, one entry per canonical skill.
    pub tools: Vec<McpTool>,
}

/// The gateway-supplied inputs shared by every discovery document. The
/// gateway binary builds one of these from its own runtime config.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Base URL the gateway is reachable at.
    pub url: String,
    /// The x402 scheme to advertise, or `None` if payment is disabled.
    pub payment: Option<X402SecurityScheme>,
    /// On-chain identity registration, or `None` if unconfigured.
    pub identity: Option<Erc8004Identity>,
}

fn skill_tags(name: &str) -> Vec<String> {
    if FREE_SKILLS.contains(&name) {
        vec!["free".to_string()]
    } else {
        vec!["paid".to_string()]
    }
}

fn skill_description(skill: &str) -> &'static str {
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

fn identity_block(identity: &Option<Erc8004Identity>) -> Option<IdentityBlock> {
    identity.clone().map(|erc8004| IdentityBlock { erc8004 })
}

/// Build the A2A Agent Card (used for both `agent.json` and its
/// `agent-card.json` alias).
pub fn build_agent_card(config: &DiscoveryConfig) -> AgentCard {
    let skills = SKILL_NAMES
        .iter()
        .map(|&name| SkillCard {
            id: name.to_string(),
            name: name.to_string(),
            description: skill_description(name).to_string(),
            tags: skill_tags(name),
        })
        .collect();

    AgentCard {
        name: config.name.clone(),
        description: config.description.clone(),
        url: config.url.clone(),
        protocol_version: "0.3.0".to_string(),
        preferred_transport: "JSONRPC".to_string(),
        capabilities: Capabilities { state_transition_history: true },
        security_schemes: SecuritySchemes { x402: config.payment.clone() },
        skills,
        identity: identity_block(&config.identity),
    }
}

/// Build the OASF descriptor.
pub fn build_oasf_descriptor(config: &DiscoveryConfig) -> OasfDescriptor {
    OasfDescriptor {
        schema_version: "0.1".to_string(),
        name: config.name.clone(),
        description: config.description.clone(),
        identity: identity_block(&config.identity),
    }
}

/// Build the MCP advertisement. `endpoint` is the gateway's MCP JSON-RPC
/// route, e.g. `"{base_url}/mcp"`.
pub fn build_mcp_discovery(endpoint: &str) -> McpDiscovery {
    let tools = tool_catalog()
        .into_iter()
        .map(|spec| McpTool { name: spec.name, description: spec.description, input_schema: spec.parameters })
        .collect();
    McpDiscovery { endpoint: endpoint.to_string(), tools }
}
