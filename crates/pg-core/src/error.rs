//! Unified error taxonomy for the gateway.
//!
//! Every fallible operation below the endpoint adapters returns a
//! [`GatewayError`]: a stable [`ErrorKind`] plus a human-readable message,
//! an optional cause, and a small context bag for diagnostics. Endpoint
//! adapters are the only place that translate a kind into a wire code
//! (JSON-RPC error codes, HTTP status codes).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The ten error kinds recognized across the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// A request parameter was missing, malformed, or out of range.
    InvalidArgument,
    /// The referenced record (task, session, flow, proof) does not exist.
    NotFound,
    /// A state transition was attempted that the transition table forbids.
    InvalidTransition,
    /// The caller's credentials (payment signature, API key) did not verify.
    Unauthenticated,
    /// The operation requires a settled payment that is missing or pending.
    PaymentRequired,
    /// The caller exceeded a rate limit.
    RateLimited,
    /// An upstream dependency (LLM, facilitator, chain RPC) timed out.
    UpstreamTimeout,
    /// An upstream dependency returned a failure or was unreachable.
    UpstreamFailure,
    /// The skill router could not resolve a skill for the given input.
    NotRoutable,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl ErrorKind {
    /// Stable `&'static str` wire code (e.g. `"RATE_LIMITED"`).
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::PaymentRequired => "PAYMENT_REQUIRED",
            Self::RateLimited => "RATE_LIMITED",
            Self::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            Self::UpstreamFailure => "UPSTREAM_FAILURE",
            Self::NotRoutable => "NOT_ROUTABLE",
            Self::Internal => "INTERNAL",
        }
    }

    /// The JSON-RPC 2.0 error code used by the A2A endpoint for this kind,
    /// when one is specified; `None` falls back to the -32603 catch-all.
    pub fn json_rpc_code(&self) -> i64 {
        match self {
            Self::NotFound => -32001,
            Self::InvalidTransition => -32002,
            Self::InvalidArgument | Self::NotRoutable => -32602,
            _ => -32603,
        }
    }

    /// The HTTP status code used by REST/chat adapters for this kind.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidArgument | Self::NotRoutable => 400,
            Self::Unauthenticated => 401,
            Self::PaymentRequired => 402,
            Self::NotFound => 404,
            Self::InvalidTransition => 409,
            Self::RateLimited => 429,
            Self::UpstreamTimeout => 504,
            Self::UpstreamFailure => 502,
            Self::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Unified gateway error.
///
/// ```
/// use pg_core::error::{ErrorKind, GatewayError};
///
/// let err = GatewayError::new(ErrorKind::RateLimited, "too many requests")
///     .with_context("retry_after_secs", 5);
/// assert_eq!(err.kind.code(), "RATE_LIMITED");
/// ```
pub struct GatewayError {
    /// Machine-readable error kind.
    pub kind: ErrorKind,
    /// Human-readable, non-leaky message.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics and logging.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl GatewayError {
    /// Create a new error with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Shorthand for `Self::new(ErrorKind::NotFound, ..)`.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Shorthand for `Self::new(ErrorKind::InvalidArgument, ..)`.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    /// Shorthand for `Self::new(ErrorKind::InvalidTransition, ..)`.
    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidTransition, message)
    }

    /// Attach a key-value pair to the diagnostic context. Serialization
    /// failures are silently skipped; context is best-effort diagnostics,
    /// never load-bearing.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Debug for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("GatewayError");
        d.field("kind", &self.kind);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.code(), self.message)
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Serializable snapshot of a [`GatewayError`], used for artifact bodies and
/// wire responses (the `source` field is dropped; its text is folded into
/// `source_message`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayErrorDto {
    /// Stable wire code, e.g. `"RATE_LIMITED"`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub context: BTreeMap<String, serde_json::Value>,
}

impl From<&GatewayError> for GatewayErrorDto {
    fn from(err: &GatewayError) -> Self {
        Self {
            code: err.kind.code().to_string(),
            message: err.message.clone(),
            context: err.context.clone(),
        }
    }
}

/// Convenient alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, GatewayError>;
