//! Decay Engine.
//!
//! Computes an entity's `effective_importance` by applying exponential
//! decay to its base `importance`, modulated by how important and how
//! often-confirmed/accessed it is, and selects low-importance entities
//! for forgetting or archival.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::config::DecayConfig;
use crate::error::Result;
use crate::graph::{Entity, GraphStore};

/// Decays importance over time and selects forget/archive candidates.
#[derive(Debug, Clone)]
pub struct DecayEngine {
    config: DecayConfig,
}

/// Confirmation/confidence bump applied by [`DecayEngine::reinforce`].
#[derive(Debug, Clone, Copy)]
pub struct ReinforceOptions {
    pub confirmation_boost: u32,
    pub confidence_boost: f64,
}

impl Default for ReinforceOptions {
    fn default() -> Self {
        Self {
            confirmation_boost: 1,
            confidence_boost: 0.1,
        }
    }
}

/// An entity selected for forgetting/archival.
#[derive(Debug, Clone)]
pub struct ForgetCandidate {
    pub name: String,
    pub effective_importance: f64,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

/// Result of a forget/archive selection pass.
#[derive(Debug, Clone)]
pub struct ForgetReport {
    pub candidates: Vec<ForgetCandidate>,
    pub dry_run: bool,
    /// Number of entities actually deleted; 0 when `dry_run` is true.
    pub archived: usize,
}

impl DecayEngine {
    pub fn new(config: DecayConfig) -> Self {
        Self { config }
    }

    /// Effective importance at `now`, per spec.md §4.9:
    ///
    /// - no `agent` fields or no prior access -> base importance, floored
    ///   at `min_importance`.
    /// - otherwise: half-life `H' = H * (1 + importance / 10)` when
    ///   `importance_modulation` is on (else `H' = H`); decay factor
    ///   `f = exp(-ln2 * elapsed_hours / H')`; strength multiplier
    ///   `s = 1 + confirmation_count * 0.1 + access_count / 100` when
    ///   `access_modulation` is on (else `s = 1`); result is
    ///   `base * f * s`, floored at `min_importance`.
    pub fn effective_importance(&self, entity: &Entity, now: DateTime<Utc>) -> f64 {
        let base = entity.importance;
        let Some(agent) = entity.agent.as_ref() else {
            return base.max(self.config.min_importance);
        };
        let Some(last_accessed) = agent.last_accessed_at else {
            return base.max(self.config.min_importance);
        };
        let elapsed_hours =
            now.signed_duration_since(last_accessed).num_seconds().max(0) as f64 / 3600.0;
        let half_life = if self.config.importance_modulation {
            self.config.half_life_hours * (1.0 + base / 10.0)
        } else {
            self.config.half_life_hours
        };
        let decay_factor = (-std::f64::consts::LN_2 * elapsed_hours / half_life).exp();
        let strength = if self.config.access_modulation {
            1.0 + agent.confirmation_count as f64 * 0.1 + agent.access_count as f64 / 100.0
        } else {
            1.0
        };
        (base * decay_factor * strength).max(self.config.min_importance)
    }

    /// Reinforce an entity: refresh `last_accessed_at`, bump
    /// `confirmation_count`, and raise `confidence` up to 1.0.
    pub fn reinforce(
        &self,
        store: &GraphStore,
        name: &str,
        options: ReinforceOptions,
    ) -> Result<Entity> {
        store.update_agent_fields(name, |agent| {
            agent.last_accessed_at = Some(Utc::now());
            agent.confirmation_count = agent.confirmation_count.saturating_add(options.confirmation_boost);
            agent.confidence = (agent.confidence + options.confidence_boost).min(1.0);
        })
    }

    /// Select entities whose effective importance has decayed below
    /// `effective_importance_threshold` for forgetting/archival.
    /// `exclude_tags` is matched case-insensitively. With `dry_run` the
    /// candidates are reported but not deleted.
    pub fn select_for_forgetting(
        &self,
        store: &GraphStore,
        effective_importance_threshold: f64,
        older_than_hours: Option<f64>,
        exclude_tags: &[String],
        dry_run: bool,
    ) -> Result<ForgetReport> {
        let now = Utc::now();
        let exclude_lower: BTreeSet<String> =
            exclude_tags.iter().map(|t| t.to_lowercase()).collect();

        let mut candidates = Vec::new();
        for entity in store.all_entities() {
            if entity
                .tags
                .iter()
                .any(|tag| exclude_lower.contains(&tag.to_lowercase()))
            {
                continue;
            }
            let effective_importance = self.effective_importance(&entity, now);
            if effective_importance > effective_importance_threshold {
                continue;
            }
            if let Some(hours) = older_than_hours {
                let reference = entity
                    .agent
                    .as_ref()
                    .and_then(|a| a.last_accessed_at)
                    .unwrap_or(entity.created_at);
                let age_hours = now.signed_duration_since(reference).num_seconds() as f64 / 3600.0;
                if age_hours < hours {
                    continue;
                }
            }
            candidates.push(ForgetCandidate {
                name: entity.name.clone(),
                effective_importance,
                last_accessed_at: entity.agent.as_ref().and_then(|a| a.last_accessed_at),
            });
        }

        let archived = if dry_run {
            0
        } else {
            for candidate in &candidates {
                store.delete_entity(&candidate.name)?;
            }
            candidates.len()
        };

        Ok(ForgetReport {
            candidates,
            dry_run,
            archived,
        })
    }
}
