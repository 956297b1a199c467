//! Access Tracker.
//!
//! Tracks per-entity access recency/frequency at runtime. Only the
//! summary fields that need to survive a restart — `access_count` and
//! `last_accessed_at` — live on [`crate::graph::AgentFields`] and are
//! persisted through the graph store; the bounded ring buffer of raw
//! timestamps used for pattern classification is process-local state,
//! rebuilt from scratch on each run like the teacher's in-memory spreading-
//! activation caches.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::graph::{Entity, GraphStore};

/// Coarse access-frequency classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPattern {
    /// >= 10 accesses/day over the tracked window.
    Frequent,
    /// >= 1 and < 10 accesses/day.
    Occasional,
    /// < 1 access/day, or too little history to tell.
    Rare,
}

#[derive(Debug, Default)]
struct History {
    recent: VecDeque<DateTime<Utc>>,
    per_session: HashMap<String, u64>,
}

/// Records entity accesses and classifies their pattern. One tracker is
/// shared for the lifetime of a [`GraphStore`].
pub struct AccessTracker {
    store: Arc<GraphStore>,
    window: usize,
    history: Mutex<HashMap<String, History>>,
}

impl AccessTracker {
    pub fn new(store: Arc<GraphStore>, window: usize) -> Self {
        Self {
            store,
            window: window.max(1),
            history: Mutex::new(HashMap::new()),
        }
    }

    /// Record an access to `name`, bumping `access_count`/`last_accessed_at`
    /// on the persisted entity and the in-memory recency ring buffer.
    /// `session_id` is optional per-session counting.
    pub fn record_access(&self, name: &str, session_id: Option<&str>) -> Result<Entity> {
        let now = Utc::now();
        {
            let mut history = self.history.lock().expect("access history mutex poisoned");
            let entry = history.entry(name.to_string()).or_default();
            entry.recent.push_back(now);
            while entry.recent.len() > self.window {
                entry.recent.pop_front();
            }
            if let Some(session_id) = session_id {
                *entry.per_session.entry(session_id.to_string()).or_insert(0) += 1;
            }
        }
        self.store.update_agent_fields(name, |agent| {
            agent.access_count += 1;
            agent.last_accessed_at = Some(now);
        })
    }

    /// Classify `name`'s access pattern from its tracked recency window.
    pub fn pattern(&self, name: &str) -> AccessPattern {
        let history = self.history.lock().expect("access history mutex poisoned");
        let Some(entry) = history.get(name) else {
            return AccessPattern::Rare;
        };
        if entry.recent.len() < 2 {
            return AccessPattern::Rare;
        }
        let first = *entry.recent.front().unwrap();
        let last = *entry.recent.back().unwrap();
        let span_hours = last.signed_duration_since(first).num_seconds() as f64 / 3600.0;
        let span_days = (span_hours / 24.0).max(1.0 / 24.0);
        let per_day = entry.recent.len() as f64 / span_days;
        if per_day >= 10.0 {
            AccessPattern::Frequent
        } else if per_day >= 1.0 {
            AccessPattern::Occasional
        } else {
            AccessPattern::Rare
        }
    }

    /// Number of accesses recorded for `name` within `session_id`.
    pub fn session_count(&self, name: &str, session_id: &str) -> u64 {
        self.history
            .lock()
            .expect("access history mutex poisoned")
            .get(name)
            .and_then(|h| h.per_session.get(session_id).copied())
            .unwrap_or(0)
    }

    /// Snapshot of the raw recency window, oldest first.
    pub fn recent_accesses(&self, name: &str) -> Vec<DateTime<Utc>> {
        self.history
            .lock()
            .expect("access history mutex poisoned")
            .get(name)
            .map(|h| h.recent.iter().copied().collect())
            .unwrap_or_default()
    }
}
