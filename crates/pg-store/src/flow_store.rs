//! Flow store (C7 persistence): persists [`ProofFlow`] records and the
//! `requestId -> flowId` reverse index used by `advanceFlow` lookups.

use crate::keys;
use pg_core::error::{ErrorKind, GatewayError};
use pg_core::flow::ProofFlow;
use pg_kv::{KvStore, Subscription};
use std::sync::Arc;

/// The flow store. Cheap to clone; wraps an `Arc<dyn KvStore>`.
#[derive(Clone)]
pub struct FlowStore {
    kv: Arc<dyn KvStore>,
}

impl FlowStore {
    /// Build a flow store over `kv`.
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Persist a freshly created flow and index it by request id.
    pub async fn create(&self, flow: &ProofFlow) -> Result<(), GatewayError> {
        self.write(flow).await?;
        self.kv
            .set(
                &keys::flow_request_index(&flow.request_id),
                flow.flow_id.clone(),
                keys::FLOW_TTL,
            )
            .await
    }

    /// Load a flow by id.
    pub async fn get(&self, flow_id: &str) -> Result<ProofFlow, GatewayError> {
        let raw = self
            .kv
            .get(&keys::flow(flow_id))
            .await?
            .ok_or_else(|| GatewayError::new(ErrorKind::NotFound, format!("flow not found: {flow_id}")))?;
        serde_json::from_str(&raw)
            .map_err(|e| GatewayError::new(ErrorKind::Internal, "corrupt flow record").with_source(e))
    }

    /// Persist updated flow state (does not touch the request-id index).
    pub async fn update(&self, flow: &ProofFlow) -> Result<(), GatewayError> {
        self.write(flow).await
    }

    /// Resolve a flow id bound to a proof request id.
    pub async fn get_flow_id_for_request(&self, request_id: &str) -> Result<Option<String>, GatewayError> {
        self.kv.get(&keys::flow_request_index(request_id)).await
    }

    /// The pub/sub channel key transitions for this flow are published on.
    pub fn events_channel(flow_id: &str) -> String {
        keys::flow_events_channel(flow_id)
    }

    /// Publish a JSON-serialized transition event for `flow_id`. Consumers
    /// that attach after this call do not see it; callers must also write
    /// the new phase to kv so late readers still observe it (spec §5).
    pub async fn publish_event(&self, flow_id: &str, event: &serde_json::Value) -> Result<(), GatewayError> {
        let raw = serde_json::to_string(event)
            .map_err(|e| GatewayError::new(ErrorKind::Internal, "failed to serialize flow event").with_source(e))?;
        self.kv.publish(&keys::flow_events_channel(flow_id), raw).await
    }

    /// Subscribe to `flow_id`'s transition channel.
    pub async fn subscribe_events(&self, flow_id: &str) -> Result<Subscription, GatewayError> {
        self.kv.subscribe(&keys::flow_events_channel(flow_id)).await
    }

    async fn write(&self, flow: &ProofFlow) -> Result<(), GatewayError> {
        let raw = serde_json::to_string(flow)
            .map_err(|e| GatewayError::new(ErrorKind::Internal, "failed to serialize flow").with_source(e))?;
        self.kv.set(&keys::flow(&flow.flow_id), raw, keys::FLOW_TTL).await
    }
}
