//! The task worker: a single background loop per process that pulls ids
//! off the submitted queue and dispatches them into the skill layer.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use pg_core::error::{ErrorKind, GatewayError};
use pg_core::task::{Artifact, TaskState};
use pg_events::{EventBus, TaskEvent};
use pg_skills::{
    check_status, generate_proof, get_supported_circuits, request_payment, request_signing,
    verify_proof, GenerateProofArgs, RequestSigningArgs, SkillDeps, VerifyProofArgs,
};
use pg_store::TaskStore;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// The worker: owns a task store handle, an event bus handle, and the
/// skill dependencies every dispatched skill call needs.
pub struct Worker {
    tasks: TaskStore,
    events: Arc<EventBus>,
    deps: SkillDeps,
    poll_interval: Duration,
}

impl Worker {
    /// Build a worker. `poll_interval` is the cadence the submitted queue
    /// is polled at when empty (`taskPollIntervalMs`, default 2000).
    pub fn new(tasks: TaskStore, events: Arc<EventBus>, deps: SkillDeps, poll_interval: Duration) -> Self {
        Self { tasks, events, deps, poll_interval }
    }

    /// Run forever: pop one id at a time, fully process it, then poll
    /// again. A single dedicated loop gives single-consumer semantics
    /// without an explicit lock; concurrent dequeues across processes
    /// are safe because the queue pop itself is atomic.
    pub async fn run(&self) -> ! {
        loop {
            match self.tasks.dequeue().await {
                Ok(Some(task_id)) => {
                    if let Err(err) = self.process(&task_id).await {
                        tracing::warn!(task_id = %task_id, code = err.kind.code(), "task processing failed");
                    }
                }
                Ok(None) => tokio::time::sleep(self.poll_interval).await,
                Err(err) => {
                    tracing::warn!(code = err.kind.code(), "queue dequeue failed");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Process exactly one task to completion. Exposed separately from
    /// [`Worker::run`] so callers (and tests) can drive the loop
    /// one step at a time.
    pub async fn process(&self, task_id: &str) -> Result<(), GatewayError> {
        let task = self.tasks.get_task(task_id).await?;
        if task.status.state != TaskState::Queued {
            tracing::warn!(task_id, state = ?task.status.state, "skipping non-queued task");
            return Ok(());
        }

        let task = self.tasks.update_task_status(task_id, TaskState::Running, None).await?;
        self.events
            .publish(
                task_id,
                TaskEvent::StatusUpdate { state: TaskState::Running, message: None, is_final: false },
            )
            .await;

        let address = extract_address(&task.params);

        match dispatch(&self.deps, &task.skill, &task.params).await {
            Ok(result) => {
                let artifact = Artifact::result(format!("{} completed", task.skill), result);
                self.tasks.add_artifact(task_id, artifact).await?;
                let task = self.tasks.update_task_status(task_id, TaskState::Completed, None).await?;
                self.events
                    .publish(
                        task_id,
                        TaskEvent::StatusUpdate { state: TaskState::Completed, message: None, is_final: true },
                    )
                    .await;
                self.events.publish(task_id, TaskEvent::TaskComplete { task }).await;

                if let (Some(sink), Some(address)) = (&self.deps.reputation, address) {
                    let sink = Arc::clone(sink);
                    let skill = task.skill.clone();
                    tokio::spawn(async move {
                        sink.record_success(&address, &skill).await;
                    });
                }
                Ok(())
            }
            Err(err) => {
                tracing::warn!(task_id, code = err.kind.code(), "skill dispatch failed");
                let artifact = Artifact::error(err.message.clone());
                self.tasks.add_artifact(task_id, artifact).await?;
                let message = Some(err.message.clone());
                let task = self.tasks.update_task_status(task_id, TaskState::Failed, message).await?;
                self.events
                    .publish(
                        task_id,
                        TaskEvent::StatusUpdate {
                            state: TaskState::Failed,
                            message: Some(err.message.clone()),
                            is_final: true,
                        },
                    )
                    .await;
                self.events.publish(task_id, TaskEvent::TaskComplete { task: task.clone() }).await;

                if let (Some(sink), Some(address)) = (&self.deps.reputation, address) {
                    let sink = Arc::clone(sink);
                    let skill = task.skill.clone();
                    let code = err.kind.code();
                    tokio::spawn(async move {
                        sink.record_failure(&address, &skill, code).await;
                    });
                }
                Ok(())
            }
        }
    }
}

fn extract_address(params: &BTreeMap<String, Value>) -> Option<String> {
    params.get("address").and_then(Value::as_str).map(str::to_string)
}

/// Dispatch `skill` with opaque `params` into the skill layer, returning
/// its result as a JSON value for the artifact data part.
async fn dispatch(
    deps: &SkillDeps,
    skill: &str,
    params: &BTreeMap<String, Value>,
) -> Result<Value, GatewayError> {
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

fn parse_args<T: DeserializeOwned>(params: &BTreeMap<String, Value>) -> Result<T, GatewayError> {
    let obj: serde_json::Map<String, Value> = params.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    serde_json::from_value(Value::Object(obj))
        .map_err(|e| GatewayError::new(ErrorKind::InvalidArgument, "malformed skill params").with_source(e))
}

fn required_string(params: &BTreeMap<String, Value>, key: &str) -> Result<String, GatewayError> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pg_core::message::{Message, Part};
    use pg_kv::InMemoryKvStore;
    use pg_skills::{PaymentMode, ProveOutput, ProveParams, Prover, ReputationSink, TeeMode};
    use pg_store::{PaymentStore, ProofStore, SessionStore};
    use std::sync::Mutex;

    struct StaticProver;
    #[async_trait]
    impl Prover for StaticProver {
        async fn prove(&self, circuit_id: &str, _params: &ProveParams) -> Result<ProveOutput, GatewayError> {
            Ok(ProveOutput {
                proof: format!("0xproof-{circuit_id}"),
                public_inputs: vec!["0x01".to_string()],
                nullifier: "0xnullifier".to_string(),
                signal_hash: "0xsignal".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        successes: Mutex<Vec<(String, String)>>,
        failures: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl ReputationSink for RecordingSink {
        async fn record_success(&self, address: &str, skill: &str) {
            self.successes.lock().unwrap().push((address.to_string(), skill.to_string()));
        }
        async fn record_failure(&self, address: &str, skill: &str, error_code: &str) {
            self.failures
                .lock()
                .unwrap()
                .push((address.to_string(), skill.to_string(), error_code.to_string()));
        }
    }

    fn deps(reputation: Option<Arc<dyn ReputationSink>>) -> (SkillDeps, TaskStore) {
        let kv: Arc<dyn pg_kv::KvStore> = Arc::new(InMemoryKvStore::new());
        let deps = SkillDeps {
            sessions: SessionStore::new(kv.clone()),
            payments: PaymentStore::new(kv.clone()),
            proofs: ProofStore::new(kv.clone()),
            tasks: TaskStore::new(kv.clone()),
            sign_page_base_url: "https://sign.example".to_string(),
            signing_ttl: Duration::from_secs(300),
            payment_mode: PaymentMode::Disabled,
            payment_price: "100000".to_string(),
            payment_network: "base-sepolia".to_string(),
            payment_currency: "USDC".to_string(),
            tee_mode: TeeMode::Disabled,
            tee_attestation_enabled: false,
            prover: Arc::new(StaticProver),
            tee: None,
            llm: None,
            reputation,
            rate_limiter: None,
            proof_cache: None,
            chain_verifier: None,
        };
        (deps, TaskStore::new(kv))
    }

    fn direct_generate_proof_params() -> BTreeMap<String, Value> {
        let mut params = BTreeMap::new();
        params.insert("address".to_string(), Value::String("0xabc".to_string()));
        params.insert("signature".to_string(), Value::String("0xsig".to_string()));
        params.insert("scope".to_string(), Value::String("e2e.app".to_string()));
        params.insert("circuitId".to_string(), Value::String("coinbase_attestation".to_string()));
        params
    }

    #[tokio::test]
    async fn processes_a_task_through_to_completion() {
        let (deps, tasks) = deps(None);
        let task = tasks
            .create_task(
                "generate_proof",
                direct_generate_proof_params(),
                Message::user(vec![Part::text("go")]),
                None,
            )
            .await
            .unwrap();
        let events = Arc::new(EventBus::new());
        let worker = Worker::new(tasks.clone(), events, deps, Duration::from_millis(10));

        worker.process(&task.id).await.unwrap();

        let reloaded = tasks.get_task(&task.id).await.unwrap();
        assert_eq!(reloaded.status.state, TaskState::Completed);
        assert_eq!(reloaded.artifacts.len(), 1);
    }

    #[tokio::test]
    async fn unroutable_skill_fails_the_task_with_an_error_artifact() {
        let (deps, tasks) = deps(None);
        let task = tasks
            .create_task("not_a_real_skill", BTreeMap::new(), Message::user(vec![Part::text("go")]), None)
            .await
            .unwrap();
        let events = Arc::new(EventBus::new());
        let worker = Worker::new(tasks.clone(), events, deps, Duration::from_millis(10));

        worker.process(&task.id).await.unwrap();

        let reloaded = tasks.get_task(&task.id).await.unwrap();
        assert_eq!(reloaded.status.state, TaskState::Failed);
        assert_eq!(reloaded.artifacts.len(), 1);
    }

    #[tokio::test]
    async fn emits_status_update_then_task_complete_in_order() {
        let (deps, tasks) = deps(None);
        let task = tasks
            .create_task(
                "get_supported_circuits",
                BTreeMap::new(),
                Message::user(vec![Part::text("go")]),
                None,
            )
            .await
            .unwrap();
        let events = Arc::new(EventBus::new());
        let mut sub = events.subscribe(&task.id).await;
        let worker = Worker::new(tasks.clone(), Arc::clone(&events), deps, Duration::from_millis(10));

        worker.process(&task.id).await.unwrap();

        let running = sub.recv().await.unwrap();
        assert!(matches!(running, TaskEvent::StatusUpdate { state: TaskState::Running, .. }));
        let completed = sub.recv().await.unwrap();
        assert!(matches!(completed, TaskEvent::StatusUpdate { state: TaskState::Completed, .. }));
        let terminal = sub.recv().await.unwrap();
        assert!(matches!(terminal, TaskEvent::TaskComplete { .. }));
    }

    #[tokio::test]
    async fn success_fires_reputation_side_effect() {
        let sink = Arc::new(RecordingSink::default());
        let (deps, tasks) = deps(Some(sink.clone()));
        let task = tasks
            .create_task(
                "generate_proof",
                direct_generate_proof_params(),
                Message::user(vec![Part::text("go")]),
                None,
            )
            .await
            .unwrap();
        let events = Arc::new(EventBus::new());
        let worker = Worker::new(tasks.clone(), events, deps, Duration::from_millis(10));

        worker.process(&task.id).await.unwrap();
        // the side effect is spawned post-terminal; give it a tick to land.
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(sink.successes.lock().unwrap().len(), 1);
        assert_eq!(sink.failures.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn dequeue_empty_queue_is_a_no_op() {
        let (_deps, tasks) = deps(None);
        assert_eq!(tasks.dequeue().await.unwrap(), None);
    }

    #[test]
    fn extract_address_reads_the_address_param() {
        let params = direct_generate_proof_params();
        assert_eq!(extract_address(&params).as_deref(), Some("0xabc"));
    }

    #[test]
    fn extract_address_is_none_when_absent() {
        assert_eq!(extract_address(&BTreeMap::new()), None);
    }
}
