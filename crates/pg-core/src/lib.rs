//! Stable contract types for the proof-serving gateway: messages, tasks,
//! proof-request sessions, flows, payment records, and the unified error
//! taxonomy shared by every crate in the workspace.
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod flow;
pub mod message;
pub mod payment;
pub mod proof;
pub mod session;
pub mod task;

pub use error::{ErrorKind, GatewayError, GatewayErrorDto, Result};
pub use flow::{FlowPhase, ProofFlow};
pub use message::{Message, Part, Role};
pub use payment::{PaymentRecord, PaymentStatus};
pub use proof::ProofRecord;
pub use session::{PaymentSubStatus, ProofRequestRecord, SessionPhase, SigningStatus};
pub use task::{Artifact, Task, TaskState, TaskStatus};
