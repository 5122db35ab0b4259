//! Read-modify-write stores for tasks, proof-request sessions, and
//! payments, all built on [`pg_kv::KvStore`].

mod flow_store;
mod keys;
mod payment_store;
mod proof_store;
mod session_store;
mod task_store;

pub use flow_store::FlowStore;
pub use keys::{DEFAULT_SIGNING_TTL, FLOW_TTL, PAYMENT_TTL, TASK_TTL};
pub use payment_store::PaymentStore;
pub use proof_store::ProofStore;
pub use session_store::SessionStore;
pub use task_store::TaskStore;
