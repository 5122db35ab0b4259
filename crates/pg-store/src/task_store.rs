//! Task store (C2): persists task records, the submitted-task queue, and
//! the context→request reverse index.

use crate::keys;
use pg_core::error::{ErrorKind, GatewayError};
use pg_core::message::Message;
use pg_core::task::{Artifact, Task, TaskState};
use pg_kv::KvStore;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The task store. Cheap to clone; wraps an `Arc<dyn KvStore>`.
#[derive(Clone)]
pub struct TaskStore {
    kv: Arc<dyn KvStore>,
}

impl TaskStore {
    /// Build a task store over `kv`.
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Atomically: generate an id, set status `submitted` then `queued`,
    /// append `user_message` to history, write the record, and push the
    /// id onto the submitted queue.
    pub async fn create_task(
        &self,
        skill: impl Into<String>,
        params: BTreeMap<String, Value>,
        user_message: Message,
        context_id: Option<String>,
    ) -> Result<Task, GatewayError> {
        let task = Task::new_queued(skill, params, user_message, context_id.clone());
        self.write(&task).await?;
        self.kv
            .list_push_back(keys::task_queue(), task.id.clone())
            .await?;
        if let Some(ctx) = context_id {
            self.kv
                .set(
                    &keys::context_index(&ctx),
                    task.id.clone(),
                    keys::TASK_TTL,
                )
                .await?;
        }
        Ok(task)
    }

    /// Load a task by id.
    pub async fn get_task(&self, id: &str) -> Result<Task, GatewayError> {
        let raw = self
            .kv
            .get(&keys::task(id))
            .await?
            .ok_or_else(|| Task::not_found(id))?;
        serde_json::from_str(&raw)
            .map_err(|e| GatewayError::new(ErrorKind::Internal, "corrupt task record").with_source(e))
    }

    /// Enforce the transition table and persist the new status.
    pub async fn update_task_status(
        &self,
        id: &str,
        next: TaskState,
        message: Option<String>,
    ) -> Result<Task, GatewayError> {
        let mut task = self.get_task(id).await?;
        task.transition(next, message)?;
        self.write(&task).await?;
        Ok(task)
    }

    /// Append an artifact and persist.
    pub async fn add_artifact(&self, id: &str, artifact: Artifact) -> Result<Task, GatewayError> {
        let mut task = self.get_task(id).await?;
        task.push_artifact(artifact);
        self.write(&task).await?;
        Ok(task)
    }

    /// Append a message to history and persist.
    pub async fn push_history(&self, id: &str, message: Message) -> Result<Task, GatewayError> {
        let mut task = self.get_task(id).await?;
        task.push_history(message);
        self.write(&task).await?;
        Ok(task)
    }

    /// Pop the next task id off the submitted queue, or `None` if empty.
    /// The worker is the sole caller; single-consumer semantics come from
    /// there being exactly one worker loop per process.
    pub async fn dequeue(&self) -> Result<Option<String>, GatewayError> {
        self.kv.list_pop_front(keys::task_queue()).await
    }

    /// Look up the request id bound to a context, via the reverse index.
    pub async fn get_context_request(&self, context_id: &str) -> Result<Option<String>, GatewayError> {
        self.kv.get(&keys::context_index(context_id)).await
    }

    /// Bind a context to a request id (overwriting any prior binding).
    pub async fn set_context_request(
        &self,
        context_id: &str,
        request_id: &str,
    ) -> Result<(), GatewayError> {
        self.kv
            .set(
                &keys::context_index(context_id),
                request_id.to_string(),
                keys::TASK_TTL,
            )
            .await
    }

    async fn write(&self, task: &Task) -> Result<(), GatewayError> {
        let raw = serde_json::to_string(task)
            .map_err(|e| GatewayError::new(ErrorKind::Internal, "failed to serialize task").with_source(e))?;
        self.kv.set(&keys::task(&task.id), raw, keys::TASK_TTL).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pg_core::message::{Message, Part};
    use pg_kv::InMemoryKvStore;

    fn store() -> TaskStore {
        TaskStore::new(Arc::new(InMemoryKvStore::new()))
    }

    #[tokio::test]
    async fn create_task_enqueues_and_persists() {
        let s = store();
        let task = s
            .create_task(
                "check_status",
                BTreeMap::new(),
                Message::user(vec![Part::text("hi")]),
                None,
            )
            .await
            .unwrap();
        assert_eq!(task.status.state, TaskState::Queued);
        let dequeued = s.dequeue().await.unwrap().unwrap();
        assert_eq!(dequeued, task.id);
    }

    #[tokio::test]
    async fn get_task_returns_not_found_for_unknown_id() {
        let s = store();
        let err = s.get_task("nope").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn update_task_status_enforces_transition_table() {
        let s = store();
        let task = s
            .create_task(
                "generate_proof",
                BTreeMap::new(),
                Message::user(vec![Part::text("hi")]),
                None,
            )
            .await
            .unwrap();
        let err = s
            .update_task_status(&task.id, TaskState::Completed, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidTransition);

        s.update_task_status(&task.id, TaskState::Running, None)
            .await
            .unwrap();
        let done = s
            .update_task_status(&task.id, TaskState::Completed, None)
            .await
            .unwrap();
        assert_eq!(done.status.state, TaskState::Completed);
    }

    #[tokio::test]
    async fn context_reverse_index_round_trips() {
        let s = store();
        s.set_context_request("ctx-1", "req-1").await.unwrap();
        assert_eq!(
            s.get_context_request("ctx-1").await.unwrap(),
            Some("req-1".to_string())
        );
    }
}
