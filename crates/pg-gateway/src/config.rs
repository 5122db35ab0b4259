//! `clap`-derived configuration covering every environment option named in
//! the gateway's external-interface contract. Parsed once at startup into a
//! validated, immutable struct; no other module reads the environment
//! directly.

use clap::{Parser, ValueEnum};
use pg_skills::{PaymentMode as SkillPaymentMode, TeeMode as SkillTeeMode};
use std::time::Duration;

/// `paymentMode`: governs whether the payment gate is active and which
/// network it settles against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lower")]
pub enum PaymentModeArg {
    /// Payment middleware inactive.
    Disabled,
    /// Testnet USDC.
    Testnet,
    /// Mainnet USDC.
    Mainnet,
}

impl From<PaymentModeArg> for SkillPaymentMode {
    fn from(value: PaymentModeArg) -> Self {
        match value {
            PaymentModeArg::Disabled => SkillPaymentMode::Disabled,
            PaymentModeArg::Testnet => SkillPaymentMode::Testnet,
            PaymentModeArg::Mainnet => SkillPaymentMode::Mainnet,
        }
    }
}

/// `teeMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lower")]
pub enum TeeModeArg {
    /// Prefer the enclave, falling back to local when unavailable.
    Auto,
    /// Local binary path, never the enclave.
    Disabled,
    /// Local TEE simulator.
    Local,
    /// Always route through the enclave.
    Nitro,
}

impl From<TeeModeArg> for SkillTeeMode {
    fn from(value: TeeModeArg) -> Self {
        match value {
            TeeModeArg::Auto => SkillTeeMode::Auto,
            TeeModeArg::Disabled => SkillTeeMode::Disabled,
            TeeModeArg::Local => SkillTeeMode::Local,
            TeeModeArg::Nitro => SkillTeeMode::Nitro,
        }
    }
}

/// The gateway's full configuration surface: one flag per §6 environment
/// option, each settable via CLI or its matching env var.
#[derive(Parser, Debug, Clone)]
#[command(name = "proofport-gateway", version, about = "Agent-native proof-serving gateway")]
pub struct Config {
    /// HTTP listener port.
    #[arg(long, env = "PORT", default_value_t = 8787)]
    pub port: u16,

    /// kv-store connection URL. The in-process store ignores this value
    /// today; it is carried so a future Redis-backed `KvStore` can read it
    /// without a config surface change.
    #[arg(long, env = "REDIS_URL", default_value = "memory://local")]
    pub redis_url: String,

    /// Public base URL used to assemble signing/payment/verify URLs.
    #[arg(long, env = "A2A_BASE_URL", default_value = "http://localhost:8787")]
    pub a2a_base_url: String,

    /// Base URL for the browser signing UI.
    #[arg(long, env = "SIGN_PAGE_URL", default_value = "http://localhost:3000")]
    pub sign_page_url: String,

    /// Session record TTL, in seconds.
    #[arg(long, env = "SIGNING_TTL_SECONDS", default_value_t = 300)]
    pub signing_ttl_seconds: u64,

    /// Payment mode.
    #[arg(long, env = "PAYMENT_MODE", value_enum, default_value_t = PaymentModeArg::Disabled)]
    pub payment_mode: PaymentModeArg,

    /// Address payment settles to. Required when `paymentMode != disabled`.
    #[arg(long, env = "PAYMENT_PAY_TO")]
    pub payment_pay_to: Option<String>,

    /// Facilitator base URL. Required when `paymentMode == testnet`.
    #[arg(long, env = "PAYMENT_FACILITATOR_URL")]
    pub payment_facilitator_url: Option<String>,

    /// Price per proof, in the smallest unit of the configured asset.
    #[arg(long, env = "PAYMENT_PROOF_PRICE", default_value = "100000")]
    pub payment_proof_price: String,

    /// USDC asset contract address for the configured network.
    #[arg(long, env = "PAYMENT_ASSET", default_value = "0x036CbD53842c5426634e7929541eC2318f3dCF7e")]
    pub payment_asset: String,

    /// Network identifier surfaced in payment challenges and discovery.
    #[arg(long, env = "PAYMENT_NETWORK", default_value = "base-sepolia")]
    pub payment_network: String,

    /// Currency code surfaced in `request_payment` results.
    #[arg(long, env = "PAYMENT_CURRENCY", default_value = "USDC")]
    pub payment_currency: String,

    /// Seconds a caller has to complete payment before a 402 challenge
    /// expires.
    #[arg(long, env = "PAYMENT_TIMEOUT_SECONDS", default_value_t = 60)]
    pub payment_timeout_seconds: u64,

    /// TEE mode.
    #[arg(long, env = "TEE_MODE", value_enum, default_value_t = TeeModeArg::Disabled)]
    pub tee_mode: TeeModeArg,

    /// Enclave vsock CID.
    #[arg(long, env = "ENCLAVE_CID")]
    pub enclave_cid: Option<u32>,

    /// Enclave vsock port.
    #[arg(long, env = "ENCLAVE_PORT")]
    pub enclave_port: Option<u32>,

    /// Whether to request a TEE attestation after a successful proof.
    #[arg(long, env = "TEE_ATTESTATION_ENABLED", default_value_t = false)]
    pub tee_attestation_enabled: bool,

    /// Chain RPC endpoint consumed by the on-chain verifier client.
    #[arg(long, env = "CHAIN_RPC_URL")]
    pub chain_rpc_url: Option<String>,

    /// Base L2 RPC endpoint.
    #[arg(long, env = "BASE_RPC_URL")]
    pub base_rpc_url: Option<String>,

    /// EAS GraphQL endpoint consumed by the prover for attestation lookups.
    #[arg(long, env = "EAS_GRAPHQL_ENDPOINT")]
    pub eas_graphql_endpoint: Option<String>,

    /// ERC-8004 identity registry contract address.
    #[arg(long, env = "ERC8004_IDENTITY_ADDRESS")]
    pub erc8004_identity_address: Option<String>,

    /// ERC-8004 reputation registry contract address.
    #[arg(long, env = "ERC8004_REPUTATION_ADDRESS")]
    pub erc8004_reputation_address: Option<String>,

    /// Chain id the ERC-8004 registries are deployed on.
    #[arg(long, env = "ERC8004_CHAIN_ID", default_value = "84532")]
    pub erc8004_chain_id: String,

    /// ERC-8004 token id identifying this agent, when registered.
    #[arg(long, env = "ERC8004_TOKEN_ID")]
    pub erc8004_token_id: Option<String>,

    /// Prover's signing key, consumed opaquely by the `Prover` backend.
    #[arg(long, env = "PROVER_PRIVATE_KEY")]
    pub prover_private_key: Option<String>,

    /// OpenAI API key; when set, enables natural-language skill routing and
    /// the chat endpoint's tool-calling loop.
    #[arg(long, env = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,

    /// Gemini API key, an alternate LLM provider.
    #[arg(long, env = "GEMINI_API_KEY")]
    pub gemini_api_key: Option<String>,

    /// Comma-separated CORS allow-list for the A2A and discovery routes.
    #[arg(long, env = "A2A_CORS_ORIGINS", default_value = "*")]
    pub a2a_cors_origins: String,

    /// `tracing-subscriber` filter directive. Falls back to `RUST_LOG`,
    /// then `"info"`, when unset.
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Deployment environment label, surfaced in logs only.
    #[arg(long, env = "DEPLOY_ENV", default_value = "development")]
    pub deploy_env: String,

    /// Node-ecosystem environment label, carried for parity with deployments
    /// that set it alongside `DEPLOY_ENV`; otherwise unused.
    #[arg(long, env = "NODE_ENV", default_value = "development")]
    pub node_env: String,

    /// Task worker poll cadence, in milliseconds.
    #[arg(long, env = "TASK_POLL_INTERVAL_MS", default_value_t = 2000)]
    pub task_poll_interval_ms: u64,

    /// Flow auto-advance poll cadence, in milliseconds.
    #[arg(long, env = "FLOW_POLL_INTERVAL_MS", default_value_t = 5000)]
    pub flow_poll_interval_ms: u64,

    /// Settlement reconciliation cadence, in milliseconds.
    #[arg(long, env = "SETTLEMENT_POLL_INTERVAL_MS", default_value_t = 30_000)]
    pub settlement_poll_interval_ms: u64,
}

impl Config {
    /// Reject invalid configuration combinations at startup rather than
    /// failing lazily on first request.
    pub fn validate(&self) -> Result<(), String> {
        if self.payment_mode != PaymentModeArg::Disabled {
            if self.payment_pay_to.is_none() {
                return Err("paymentMode requires paymentPayTo".to_string());
            }
            if self.payment_mode == PaymentModeArg::Testnet && self.payment_facilitator_url.is_none() {
                return Err("paymentMode=testnet requires paymentFacilitatorUrl".to_string());
            }
            if self.payment_mode == PaymentModeArg::Mainnet && self.payment_facilitator_url.is_none() {
                return Err("paymentMode=mainnet requires paymentFacilitatorUrl".to_string());
            }
        }
        if self.tee_mode == TeeModeArg::Nitro && (self.enclave_cid.is_none() || self.enclave_port.is_none()) {
            return Err("teeMode=nitro requires enclaveCid and enclavePort".to_string());
        }
        Ok(())
    }

    /// Parsed `tracing-subscriber` filter source: `LOG_LEVEL`, falling back
    /// to `RUST_LOG`, then `"info"`.
    pub fn log_filter(&self) -> String {
        self.log_level
            .clone()
            .or_else(|| std::env::var("RUST_LOG").ok())
            .unwrap_or_else(|| "info".to_string())
    }

    /// `signingTtlSeconds` as a `Duration`.
    pub fn signing_ttl(&self) -> Duration {
        Duration::from_secs(self.signing_ttl_seconds)
    }

    /// Task worker poll cadence as a `Duration`.
    pub fn task_poll_interval(&self) -> Duration {
        Duration::from_millis(self.task_poll_interval_ms)
    }

    /// Flow auto-advance poll cadence as a `Duration`.
    pub fn flow_poll_interval(&self) -> Duration {
        Duration::from_millis(self.flow_poll_interval_ms)
    }

    /// Settlement reconciliation cadence as a `Duration`.
    pub fn settlement_poll_interval(&self) -> Duration {
        Duration::from_millis(self.settlement_poll_interval_ms)
    }

    /// Parsed CORS allow-list, trimmed and filtered for blanks.
    pub fn cors_origins(&self) -> Vec<String> {
        self.a2a_cors_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Config {
        Config::parse_from(std::iter::once("proofport-gateway").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_validate_with_payment_disabled() {
        let config = parse(&[]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn testnet_without_facilitator_url_is_rejected() {
        let config = parse(&["--payment-mode", "testnet", "--payment-pay-to", "0xabc"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn testnet_with_pay_to_and_facilitator_validates() {
        let config = parse(&[
            "--payment-mode",
            "testnet",
            "--payment-pay-to",
            "0xabc",
            "--payment-facilitator-url",
            "https://facilitator.example",
        ]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn nitro_without_enclave_coordinates_is_rejected() {
        let config = parse(&["--tee-mode", "nitro"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn cors_origins_splits_and_trims() {
        let config = parse(&["--a2a-cors-origins", "https://a.example, https://b.example"]);
        assert_eq!(config.cors_origins(), vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn log_filter_defaults_to_info() {
        let config = parse(&[]);
        assert_eq!(config.log_filter(), "info");
    }
}
