//! Key layout and default TTLs (spec §3). Every key builder here has a
//! single caller-facing purpose; nothing outside this module should format
//! a kv key by hand.

use std::time::Duration;

/// TTL for task records and the context reverse index.
pub const TASK_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Default TTL for proof-request session records (`signingTtlSeconds`).
pub const DEFAULT_SIGNING_TTL: Duration = Duration::from_secs(300);
/// TTL for flow records and the request reverse index.
pub const FLOW_TTL: Duration = Duration::from_secs(300);
/// TTL for payment records and their indexes.
pub const PAYMENT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// `a2a:task:{id}`
pub fn task(id: &str) -> String {
    format!("a2a:task:{id}")
}

/// `a2a:queue:submitted`
pub fn task_queue() -> &'static str {
    "a2a:queue:submitted"
}

/// `a2a:ctx:{contextId}`
pub fn context_index(context_id: &str) -> String {
    format!("a2a:ctx:{context_id}")
}

/// `signing:{requestId}`
pub fn session(request_id: &str) -> String {
    format!("signing:{request_id}")
}

/// `flow:{flowId}`
pub fn flow(flow_id: &str) -> String {
    format!("flow:{flow_id}")
}

/// `flow:req:{requestId}`
pub fn flow_request_index(request_id: &str) -> String {
    format!("flow:req:{request_id}")
}

/// `flow:events:{flowId}`
pub fn flow_events_channel(flow_id: &str) -> String {
    format!("flow:events:{flow_id}")
}

/// `payment:{id}`
pub fn payment(id: &str) -> String {
    format!("payment:{id}")
}

/// `payment:task:{taskId}`
pub fn payment_task_index(task_id: &str) -> String {
    format!("payment:task:{task_id}")
}

/// `payment:status:{status}`
pub fn payment_status_index(status: &str) -> String {
    format!("payment:status:{status}")
}

/// `payment:queue:pending`
pub fn payment_pending_queue() -> &'static str {
    "payment:queue:pending"
}

/// `proof:{proofId}`
pub fn proof(proof_id: &str) -> String {
    format!("proof:{proof_id}")
}
