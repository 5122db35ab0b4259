//! A process-local, per-task publish/subscribe event bus.
//!
//! Emits three event kinds (`status-update`, `artifact-update`,
//! `task-complete`) and guarantees that, for a given task id, a subscriber
//! sees events in the exact order the producer emitted them (spec §4.2,
//! §5). Late subscribers see nothing: resubscription after a gap is the
//! caller's job (snapshot the task, then subscribe).
#![deny(unsafe_code)]
#![warn(missing_docs)]

use pg_core::task::{Artifact, Task, TaskState};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

const DEFAULT_CAPACITY: usize = 64;

/// One of the three event kinds a task's event bus channel carries.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TaskEvent {
    /// A task status transition.
    StatusUpdate {
        /// The new state.
        state: TaskState,
        /// Optional human-readable status message.
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        /// Whether this is the terminal status update for the task.
        #[serde(rename = "final")]
        is_final: bool,
    },
    /// A new artifact was attached.
    ArtifactUpdate {
        /// The artifact.
        artifact: Artifact,
        /// Whether this is the artifact's last chunk (the gateway never
        /// streams partial artifacts today, so this is always `true`, but
        /// the field is carried for forward compatibility with chunked
        /// producers).
        #[serde(rename = "lastChunk")]
        last_chunk: bool,
    },
    /// The task reached a terminal state.
    TaskComplete {
        /// The final task snapshot.
        task: Task,
    },
}

impl TaskEvent {
    /// Whether this event is the terminal event for its task (either a
    /// final status-update or a task-complete event).
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::StatusUpdate { is_final, .. } => *is_final,
            Self::TaskComplete { .. } => true,
            Self::ArtifactUpdate { .. } => false,
        }
    }
}

#[derive(Default)]
struct StatsInner {
    total_published: AtomicU64,
    dropped_events: AtomicU64,
}

/// A snapshot of bus-wide statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBusStats {
    /// Total events published across all task channels.
    pub total_published: u64,
    /// Number of task channels currently tracked.
    pub active_channels: usize,
    /// Events lost to lag or to having no subscribers at publish time.
    pub dropped_events: u64,
}

struct Channel {
    tx: broadcast::Sender<TaskEvent>,
}

/// Per-task event bus.
pub struct EventBus {
    channels: Arc<RwLock<HashMap<String, Channel>>>,
    stats: Arc<StatsInner>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(StatsInner::default()),
        }
    }

    /// Publish `event` to `task_id`'s channel, creating the channel if
    /// this is the first event for that task. If the event is terminal
    /// and no subscribers remain after sending, the channel is reclaimed.
    pub async fn publish(&self, task_id: &str, event: TaskEvent) {
        self.stats.total_published.fetch_add(1, Ordering::Relaxed);
        let is_terminal = event.is_terminal();
        let mut channels = self.channels.write().await;
        let channel = channels
            .entry(task_id.to_string())
            .or_insert_with(|| Channel {
                tx: broadcast::channel(DEFAULT_CAPACITY).0,
            });
        if channel.tx.send(event).is_err() {
            self.stats.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
        if is_terminal && channel.tx.receiver_count() == 0 {
            channels.remove(task_id);
        }
    }

    /// Subscribe to `task_id`'s channel, receiving only future events.
    pub async fn subscribe(&self, task_id: &str) -> TaskEventSubscription {
        let mut channels = self.channels.write().await;
        let channel = channels
            .entry(task_id.to_string())
            .or_insert_with(|| Channel {
                tx: broadcast::channel(DEFAULT_CAPACITY).0,
            });
        TaskEventSubscription {
            rx: channel.tx.subscribe(),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Snapshot current bus statistics.
    pub async fn stats(&self) -> EventBusStats {
        EventBusStats {
            total_published: self.stats.total_published.load(Ordering::Relaxed),
            active_channels: self.channels.read().await.len(),
            dropped_events: self.stats.dropped_events.load(Ordering::Relaxed),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A handle receiving events for one task.
pub struct TaskEventSubscription {
    rx: broadcast::Receiver<TaskEvent>,
    stats: Arc<StatsInner>,
}

impl TaskEventSubscription {
    /// Receive the next event, waiting asynchronously. Returns `None`
    /// when the channel is closed (the bus was dropped).
    pub async fn recv(&mut self) -> Option<TaskEvent> {
        loop {
            match self.rx.recv().await {
                Ok(ev) => return Some(ev),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.stats.dropped_events.fetch_add(n, Ordering::Relaxed);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pg_core::message::{Message, Part};

    fn sample_task() -> Task {
        Task::new_queued(
            "check_status",
            Default::default(),
            Message::user(vec![Part::text("hi")]),
            None,
        )
    }

    #[tokio::test]
    async fn subscriber_sees_events_in_emission_order() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe("t1").await;
        bus.publish(
            "t1",
            TaskEvent::StatusUpdate {
                state: TaskState::Running,
                message: None,
                is_final: false,
            },
        )
        .await;
        bus.publish(
            "t1",
            TaskEvent::StatusUpdate {
                state: TaskState::Completed,
                message: None,
                is_final: true,
            },
        )
        .await;

        let first = sub.recv().await.unwrap();
        let second = sub.recv().await.unwrap();
        assert!(matches!(
            first,
            TaskEvent::StatusUpdate {
                state: TaskState::Running,
                ..
            }
        ));
        assert!(matches!(
            second,
            TaskEvent::StatusUpdate {
                state: TaskState::Completed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn late_subscriber_does_not_see_past_events() {
        let bus = EventBus::new();
        bus.publish(
            "t2",
            TaskEvent::StatusUpdate {
                state: TaskState::Running,
                message: None,
                is_final: false,
            },
        )
        .await;
        let mut sub = bus.subscribe("t2").await;
        bus.publish(
            "t2",
            TaskEvent::StatusUpdate {
                state: TaskState::Completed,
                message: None,
                is_final: true,
            },
        )
        .await;
        let ev = sub.recv().await.unwrap();
        assert!(matches!(
            ev,
            TaskEvent::StatusUpdate {
                state: TaskState::Completed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn terminal_event_reclaims_channel_once_unsubscribed() {
        let bus = EventBus::new();
        {
            let _sub = bus.subscribe("t3").await;
            bus.publish(
                "t3",
                TaskEvent::TaskComplete {
                    task: sample_task(),
                },
            )
            .await;
            assert_eq!(bus.stats().await.active_channels, 1);
        }
        // subscriber dropped; a fresh publish should find no channel and
        // recreate + immediately reclaim it since nobody's listening.
        bus.publish(
            "t3",
            TaskEvent::TaskComplete {
                task: sample_task(),
            },
        )
        .await;
        assert_eq!(bus.stats().await.active_channels, 0);
    }
}
