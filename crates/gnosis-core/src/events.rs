//! Change event bus.
//!
//! The graph store publishes a typed event after every mutation; index
//! subscribers (C3 TF/IDF, C4 vector store) observe them in commit order
//! to stay consistent with the graph without re-scanning it. Broadcast is
//! used rather than a plain `Vec<Box<dyn Fn>>` registry so subscribers can
//! be added and dropped independently and so commit-time publication never
//! blocks on a slow listener (a full channel just drops the oldest event
//! for that listener, per `tokio::sync::broadcast` semantics).

use crate::graph::entity::Entity;
use crate::graph::relation::Relation;
use serde::{Deserialize, Serialize};

/// A single change to the graph, broadcast synchronously from the
/// transaction boundary in commit order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// `entity:created(entity)` — shallow copy of the new entity.
    EntityCreated { entity: Entity },
    /// `entity:updated(name, patch)` — name plus the applied patch (as JSON).
    EntityUpdated {
        name: String,
        patch: serde_json::Value,
    },
    /// `entity:deleted(name)`.
    EntityDeleted { name: String },
    /// `observation:added(name, observations)`.
    ObservationAdded {
        name: String,
        observations: Vec<String>,
    },
    /// `relation:created(relation)`.
    RelationCreated { relation: Relation },
    /// `relation:deleted(from, to, type)`.
    RelationDeleted {
        from: String,
        to: String,
        relation_type: String,
    },
}

/// Default channel capacity. Large enough that a lagging subscriber
/// inside a bulk load (disabled subscription, see [`EventBus::disable`])
/// does not matter, small enough to bound memory for a truly stuck one.
const CHANNEL_CAPACITY: usize = 1024;

/// Typed pub/sub bus for [`ChangeEvent`]s.
pub struct EventBus {
    sender: tokio::sync::broadcast::Sender<ChangeEvent>,
    enabled: std::sync::atomic::AtomicBool,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _receiver) = tokio::sync::broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            enabled: std::sync::atomic::AtomicBool::new(true),
        }
    }

    /// Subscribe to all future events. Returns a [`Subscription`] handle
    /// that can be independently enabled/disabled (idempotently) without
    /// affecting other subscribers.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Publish an event to all current subscribers. A no-op while the bus
    /// is disabled.
    pub fn publish(&self, event: ChangeEvent) {
        if !self.enabled.load(std::sync::atomic::Ordering::Acquire) {
            return;
        }
        // No subscribers is not an error: events are fire-and-forget.
        let _ = self.sender.send(event);
    }

    /// Disable publication. Idempotent.
    pub fn disable(&self) {
        self.enabled
            .store(false, std::sync::atomic::Ordering::Release);
    }

    /// Re-enable publication. Idempotent.
    pub fn enable(&self) {
        self.enabled
            .store(true, std::sync::atomic::Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(std::sync::atomic::Ordering::Acquire)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A live subscription to the [`EventBus`].
pub struct Subscription {
    receiver: tokio::sync::broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    /// Await the next event. Returns `None` if the bus has been dropped.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
