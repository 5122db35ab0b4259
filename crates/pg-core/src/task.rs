//! Tasks: the unit of asynchronous work dispatched to a skill.

use crate::error::{ErrorKind, GatewayError};
use crate::message::{Message, Part};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The finite set of states a [`Task`] can occupy.
///
/// ```text
/// submitted -> queued -> running -> { completed | failed | canceled
///                                   | rejected | input-required
///                                   | auth-required }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    /// Just created, not yet enqueued.
    Submitted,
    /// Enqueued, waiting for the worker.
    Queued,
    /// Picked up by the worker, dispatch in progress.
    Running,
    /// Terminal: completed successfully.
    Completed,
    /// Terminal: completed with an error.
    Failed,
    /// Terminal: canceled before or during execution.
    Canceled,
    /// Terminal: rejected before being enqueued (e.g. unroutable skill).
    Rejected,
    /// Non-terminal: waiting on additional caller input.
    InputRequired,
    /// Non-terminal: waiting on caller authentication.
    AuthRequired,
}

impl TaskState {
    /// Whether this state is terminal (no further transitions are valid).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Canceled | Self::Rejected
        )
    }

    /// The states reachable directly from this one under the transition
    /// table in §3 of the spec.
    pub fn valid_next_states(&self) -> &'static [TaskState] {
        use TaskState::*;
        match self {
            Submitted => &[Queued, Rejected],
            Queued => &[Running, Canceled, Rejected],
            Running => &[
                Completed,
                Failed,
                Canceled,
                Rejected,
                InputRequired,
                AuthRequired,
            ],
            InputRequired | AuthRequired => &[Running, Canceled, Failed],
            Completed | Failed | Canceled | Rejected => &[],
        }
    }

    /// Whether a transition from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        self.valid_next_states().contains(&next)
    }
}

/// The task's current status: state, optional human message, and the time
/// it was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    /// Current state.
    pub state: TaskState,
    /// Optional human-readable status message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// When this status was recorded.
    pub timestamp: DateTime<Utc>,
}

impl TaskStatus {
    /// Build a status record for `state`, timestamped now.
    pub fn new(state: TaskState, message: Option<String>) -> Self {
        Self {
            state,
            message,
            timestamp: Utc::now(),
        }
    }
}

/// A sealed unit of task output: an id, a MIME type, and ordered parts.
/// By convention the first text part carries a human summary and
/// subsequent data parts carry the machine payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Unique artifact id.
    pub id: String,
    /// MIME type of the artifact as a whole.
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    /// Ordered content parts.
    pub parts: Vec<Part>,
}

impl Artifact {
    /// Build a result artifact: a human summary text part followed by a
    /// JSON data part carrying the structured skill result.
    pub fn result(summary: impl Into<String>, data: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            mime_type: "application/json".to_string(),
            parts: vec![Part::text(summary), Part::json(data)],
        }
    }

    /// Build an error artifact: a single, non-leaky text part.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            mime_type: "text/plain".to_string(),
            parts: vec![Part::text(message)],
        }
    }
}

/// A task: the gateway's unit of asynchronous, queued work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task id.
    pub id: String,
    /// Session thread this task belongs to, if any.
    #[serde(rename = "contextId", skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    /// The skill this task dispatches to.
    pub skill: String,
    /// Opaque skill parameters.
    pub params: BTreeMap<String, Value>,
    /// Current status.
    pub status: TaskStatus,
    /// Append-only message history.
    pub history: Vec<Message>,
    /// Append-only artifact list.
    pub artifacts: Vec<Artifact>,
}

impl Task {
    /// Construct a freshly submitted task, already transitioned to
    /// `queued` (the store's `createTask` always performs both steps in
    /// one write).
    pub fn new_queued(
        skill: impl Into<String>,
        params: BTreeMap<String, Value>,
        user_message: Message,
        context_id: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            context_id,
            skill: skill.into(),
            params,
            status: TaskStatus::new(TaskState::Queued, None),
            history: vec![user_message],
            artifacts: Vec::new(),
        }
    }

    /// Apply a status transition, enforcing the transition table.
    pub fn transition(
        &mut self,
        next: TaskState,
        message: Option<String>,
    ) -> Result<(), GatewayError> {
        if !self.status.state.can_transition_to(next) {
            return Err(GatewayError::invalid_transition(format!(
                "Invalid status transition: {:?} -> {:?}",
                self.status.state, next
            )));
        }
        self.status = TaskStatus::new(next, message);
        Ok(())
    }

    /// Append a message to history. Never removes or reorders prior
    /// entries.
    pub fn push_history(&mut self, message: Message) {
        self.history.push(message);
    }

    /// Append an artifact. Never removes or reorders prior entries.
    pub fn push_artifact(&mut self, artifact: Artifact) {
        self.artifacts.push(artifact);
    }

    /// Return a copy of this task with `history` truncated to its last
    /// `n` entries, or unchanged if it already has `n` or fewer.
    pub fn with_history_length(&self, n: usize) -> Task {
        let mut clone = self.clone();
        if clone.history.len() > n {
            let start = clone.history.len() - n;
            clone.history = clone.history.split_off(start);
        }
        clone
    }

    /// Whether this task is known to the error-mapping layer as not found.
    pub fn not_found(id: &str) -> GatewayError {
        GatewayError::new(ErrorKind::NotFound, format!("task not found: {id}"))
    }
}
