//! Relation type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A directed edge between two entity names, uniquely keyed by
/// (from, to, relation_type).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub from: String,
    pub to: String,
    pub relation_type: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl Relation {
    pub fn new(from: impl Into<String>, to: impl Into<String>, relation_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            from: from.into(),
            to: to.into(),
            relation_type: relation_type.into(),
            created_at: now,
            last_modified: now,
        }
    }

    /// The uniqueness key described in spec.md §3.
    pub fn key(&self) -> (String, String, String) {
        (self.from.clone(), self.to.clone(), self.relation_type.clone())
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.from.trim().is_empty() || self.to.trim().is_empty() {
            return Err(crate::error::Error::Validation(
                "relation from/to must not be empty".into(),
            ));
        }
        if self.relation_type.trim().is_empty() {
            return Err(crate::error::Error::Validation(
                "relation_type must not be empty".into(),
            ));
        }
        Ok(())
    }
}
