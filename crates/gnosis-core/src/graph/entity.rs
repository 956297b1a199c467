//! Entity type.
//!
//! Agent and Session extensions are represented as optional field groups
//! on the base [`Entity`] rather than separate Rust types: callers dispatch on whether
//! `agent` / `session` is `Some`, no virtual dispatch needed, and a
//! single `Vec<Entity>` graph snapshot covers all three kinds uniformly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Agent-memory classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    #[default]
    Working,
    Episodic,
    Semantic,
    Procedural,
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryType::Working => write!(f, "working"),
            MemoryType::Episodic => write!(f, "episodic"),
            MemoryType::Semantic => write!(f, "semantic"),
            MemoryType::Procedural => write!(f, "procedural"),
        }
    }
}

impl std::str::FromStr for MemoryType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "working" => Ok(MemoryType::Working),
            "episodic" => Ok(MemoryType::Episodic),
            "semantic" => Ok(MemoryType::Semantic),
            "procedural" => Ok(MemoryType::Procedural),
            other => Err(crate::error::Error::Validation(format!(
                "unknown memory_type: {other}"
            ))),
        }
    }
}

/// Agent memory visibility.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Shared,
}

/// Session status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Active,
    Completed,
    Abandoned,
}

/// Agent-entity-specific fields, present only when the entity is tracked
/// by the agent-memory layer.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AgentFields {
    pub memory_type: MemoryType,
    pub session_id: Option<String>,
    pub task_id: Option<String>,
    pub agent_id: Option<String>,
    pub access_count: u64,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub confidence: f64,
    pub confirmation_count: u32,
    pub visibility: Visibility,
    pub expires_at: Option<DateTime<Utc>>,
    /// Set when a working memory is promoted to episodic on session end.
    pub promoted_from: Option<MemoryType>,
}

/// Session-entity-specific fields.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionFields {
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub memory_count: u64,
    pub previous_session_id: Option<String>,
    pub related_session_ids: Vec<String>,
}

/// A named, typed node in the graph with observations and metadata.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Unique, case-sensitive name.
    pub name: String,
    /// Entity type; case-insensitive for matching, stored as given.
    pub entity_type: String,
    /// Ordered free-text facts; order preserved on write, set-semantics on add/remove.
    pub observations: Vec<String>,
    /// Lowercased tag set.
    pub tags: BTreeSet<String>,
    /// Importance in [0, 10], default 5.
    pub importance: f64,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    /// Name of another entity serving as hierarchical parent.
    pub parent_id: Option<String>,
    /// Arbitrary additional metadata.
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Present when this entity participates in the agent-memory layer.
    pub agent: Option<AgentFields>,
    /// Present when this entity represents a session.
    pub session: Option<SessionFields>,
}

/// Default importance per spec.md §3.
pub const DEFAULT_IMPORTANCE: f64 = 5.0;

impl Entity {
    /// Construct a bare entity with defaults; `created_at`/`last_modified`
    /// set to now.
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            observations: Vec::new(),
            tags: BTreeSet::new(),
            importance: DEFAULT_IMPORTANCE,
            created_at: now,
            last_modified: now,
            parent_id: None,
            metadata: serde_json::Map::new(),
            agent: None,
            session: None,
        }
    }

    /// Validate the static shape invariants from spec.md §3: non-empty
    /// name, non-empty type, non-empty observations, importance range.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::error::Error::Validation(
                "entity name must not be empty".into(),
            ));
        }
        if self.entity_type.trim().is_empty() {
            return Err(crate::error::Error::Validation(
                "entity_type must not be empty".into(),
            ));
        }
        if self.observations.iter().any(|o| o.trim().is_empty()) {
            return Err(crate::error::Error::Validation(
                "observations must not contain empty strings".into(),
            ));
        }
        if !(0.0..=10.0).contains(&self.importance) {
            return Err(crate::error::Error::InvalidImportance(self.importance));
        }
        Ok(())
    }

    /// Add observations with set-semantics dedup, preserving insertion order.
    pub fn add_observations(&mut self, new_observations: impl IntoIterator<Item = String>) {
        for obs in new_observations {
            if obs.trim().is_empty() {
                continue;
            }
            if !self.observations.contains(&obs) {
                self.observations.push(obs);
            }
        }
        self.last_modified = Utc::now();
    }

    /// Remove observations by exact match.
    pub fn remove_observations(&mut self, to_remove: &[String]) {
        self.observations.retain(|o| !to_remove.contains(o));
        self.last_modified = Utc::now();
    }

    /// Lowercased entity type, used for case-insensitive matching.
    pub fn type_key(&self) -> String {
        self.entity_type.to_lowercase()
    }

    /// Lowercased name, pre-cacheable for search.
    pub fn name_lower(&self) -> String {
        self.name.to_lowercase()
    }

    /// Document text for the TF/IDF index: name ⊕ type ⊕ observations.
    pub fn document_text(&self) -> String {
        let mut parts = vec![self.name.clone(), self.entity_type.clone()];
        parts.extend(self.observations.iter().cloned());
        parts.join(" ")
    }
}
