use crate::{KvStore, Subscription};
use async_trait::async_trait;
use pg_core::error::GatewayError;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, RwLock};

const PUBSUB_CAPACITY: usize = 256;

struct StringEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl StringEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|exp| now < exp)
    }
}

struct ListEntry {
    values: VecDeque<String>,
    expires_at: Option<Instant>,
}

impl ListEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|exp| now < exp)
    }
}

#[derive(Default)]
struct Inner {
    strings: HashMap<String, StringEntry>,
    lists: HashMap<String, ListEntry>,
    channels: HashMap<String, broadcast::Sender<String>>,
}

/// An in-memory [`KvStore`] good enough for a single gateway process.
/// Expiry is checked lazily on access, matching the spec's "tolerates
/// complete kv loss" posture rather than running a background reaper.
pub struct InMemoryKvStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryKvStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for InMemoryKvStore {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), GatewayError> {
        let mut inner = self.inner.write().await;
        inner.strings.insert(
            key.to_string(),
            StringEntry {
                value,
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        match inner.strings.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                inner.strings.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), GatewayError> {
        let mut inner = self.inner.write().await;
        inner.strings.remove(key);
        inner.lists.remove(key);
        Ok(())
    }

    async fn list_push_back(&self, key: &str, value: String) -> Result<(), GatewayError> {
        let mut inner = self.inner.write().await;
        let entry = inner.lists.entry(key.to_string()).or_insert(ListEntry {
            values: VecDeque::new(),
            expires_at: None,
        });
        entry.values.push_back(value);
        Ok(())
    }

    async fn list_pop_front(&self, key: &str) -> Result<Option<String>, GatewayError> {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        match inner.lists.get_mut(key) {
            Some(entry) if entry.is_live(now) => Ok(entry.values.pop_front()),
            Some(_) => {
                inner.lists.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn list_len(&self, key: &str) -> Result<usize, GatewayError> {
        let now = Instant::now();
        let inner = self.inner.read().await;
        Ok(inner
            .lists
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.values.len())
            .unwrap_or(0))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), GatewayError> {
        let mut inner = self.inner.write().await;
        let deadline = Instant::now() + ttl;
        if let Some(entry) = inner.strings.get_mut(key) {
            entry.expires_at = Some(deadline);
        }
        if let Some(entry) = inner.lists.get_mut(key) {
            entry.expires_at = Some(deadline);
        }
        Ok(())
    }

    async fn publish(&self, channel: &str, message: String) -> Result<(), GatewayError> {
        let inner = self.inner.read().await;
        if let Some(tx) = inner.channels.get(channel) {
            // No subscribers is not an error: the spec requires consumers
            // to tolerate drops (flow pub/sub has a polling fallback).
            let _ = tx.send(message);
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, GatewayError> {
        let mut inner = self.inner.write().await;
        let tx = inner
            .channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(PUBSUB_CAPACITY).0);
        Ok(Subscription::new(tx.subscribe()))
    }

    async fn ping(&self) -> Result<(), GatewayError> {
        let _ = self.inner.read().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let kv = InMemoryKvStore::new();
        kv.set("k", "v".to_string(), StdDuration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(kv.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn expired_key_reads_as_absent() {
        let kv = InMemoryKvStore::new();
        kv.set("k", "v".to_string(), StdDuration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        assert_eq!(kv.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_push_and_pop_preserve_fifo_order() {
        let kv = InMemoryKvStore::new();
        kv.list_push_back("q", "a".to_string()).await.unwrap();
        kv.list_push_back("q", "b".to_string()).await.unwrap();
        assert_eq!(kv.list_pop_front("q").await.unwrap(), Some("a".to_string()));
        assert_eq!(kv.list_pop_front("q").await.unwrap(), Some("b".to_string()));
        assert_eq!(kv.list_pop_front("q").await.unwrap(), None);
    }

    #[tokio::test]
    async fn subscribers_only_see_future_publications() {
        let kv = InMemoryKvStore::new();
        kv.publish("ch", "before".to_string()).await.unwrap();
        let mut sub = kv.subscribe("ch").await.unwrap();
        kv.publish("ch", "after".to_string()).await.unwrap();
        assert_eq!(sub.recv().await, Some("after".to_string()));
    }

    #[tokio::test]
    async fn delete_removes_both_string_and_list_slots() {
        let kv = InMemoryKvStore::new();
        kv.set("x", "1".to_string(), StdDuration::from_secs(60))
            .await
            .unwrap();
        kv.list_push_back("x", "1".to_string()).await.unwrap();
        kv.delete("x").await.unwrap();
        assert_eq!(kv.get("x").await.unwrap(), None);
        assert_eq!(kv.list_len("x").await.unwrap(), 0);
    }
}
