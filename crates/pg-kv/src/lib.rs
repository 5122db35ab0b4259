//! A TTL-bearing key/value store abstraction.
//!
//! Every record the gateway persists (§3 of the spec) carries a TTL; the
//! system is built to tolerate complete store loss. [`KvStore`] exposes the
//! three primitives the rest of the workspace needs: strings (session,
//! task, flow, and payment records, serialized as JSON), lists (the
//! submitted-task queue), and pub/sub (flow transition fan-out).
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod memory;

use async_trait::async_trait;
use pg_core::error::GatewayError;
use std::time::Duration;
use tokio::sync::broadcast;

pub use memory::InMemoryKvStore;

/// A subscription to a pub/sub channel. Dropping it unsubscribes.
pub struct Subscription {
    rx: broadcast::Receiver<String>,
}

impl Subscription {
    /// Wrap a raw broadcast receiver.
    pub fn new(rx: broadcast::Receiver<String>) -> Self {
        Self { rx }
    }

    /// Receive the next published message, waiting asynchronously.
    ///
    /// Returns `None` when the channel is closed. Lagged messages are
    /// skipped (the flow pub/sub channel is explicitly designed to
    /// tolerate drops — see the 5-second polling fallback in `pg-flow`),
    /// not surfaced as an error.
    pub async fn recv(&mut self) -> Option<String> {
        loop {
            match self.rx.recv().await {
                Ok(msg) => return Some(msg),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// String/list/pub-sub primitives with TTL, backing every persisted
/// record in the gateway.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Store `value` under `key`, expiring after `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), GatewayError>;

    /// Load the value under `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError>;

    /// Delete `key` unconditionally.
    async fn delete(&self, key: &str) -> Result<(), GatewayError>;

    /// Whether `key` is present and unexpired.
    async fn exists(&self, key: &str) -> Result<bool, GatewayError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Append `value` to the back of the list at `key`, creating it if
    /// absent. Lists do not expire by default; callers that need a TTL on
    /// a list key use `expire`.
    async fn list_push_back(&self, key: &str, value: String) -> Result<(), GatewayError>;

    /// Pop and return the value at the front of the list at `key`, or
    /// `None` if empty or absent.
    async fn list_pop_front(&self, key: &str) -> Result<Option<String>, GatewayError>;

    /// Current length of the list at `key`.
    async fn list_len(&self, key: &str) -> Result<usize, GatewayError>;

    /// Apply a TTL to an existing key (string or list).
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), GatewayError>;

    /// Publish `message` on `channel` to all current subscribers.
    /// Subscribers that attach after this call do not see it — consumers
    /// must tolerate drops (spec §4.4, §9).
    async fn publish(&self, channel: &str, message: String) -> Result<(), GatewayError>;

    /// Subscribe to `channel`, receiving only future publications.
    async fn subscribe(&self, channel: &str) -> Result<Subscription, GatewayError>;

    /// A cheap round-trip used by the `/readyz` probe.
    async fn ping(&self) -> Result<(), GatewayError>;
}
