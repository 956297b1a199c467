//! Salience Engine.
//!
//! Combines base importance, recency, access frequency, contextual
//! relevance to the caller's current task/session, and novelty into a
//! single salience score in `[0, 1]` used to rank memories for recall and
//! context packing (C11).

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};

use crate::config::SalienceConfig;
use crate::graph::Entity;
use crate::memory::decay::DecayEngine;
use crate::text::tokenize;

/// Shifts which end of an entity's lifetime recency rewards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemporalFocus {
    /// Halves the recency half-life: favors very recent activity.
    Recent,
    #[default]
    Balanced,
    /// Doubles the recency half-life: favors long-standing memories.
    Historical,
}

/// Per-query salience-scoring context.
#[derive(Debug, Clone, Default)]
pub struct SalienceContext {
    pub now: Option<DateTime<Utc>>,
    pub temporal_focus: TemporalFocus,
    pub current_task_id: Option<String>,
    pub current_session_id: Option<String>,
    pub recent_entity_names: BTreeSet<String>,
    pub query_text: Option<String>,
}

/// Per-component breakdown backing the combined `total` score.
#[derive(Debug, Clone, Copy)]
pub struct SalienceBreakdown {
    pub base_importance: f64,
    pub recency_boost: f64,
    pub frequency_boost: f64,
    pub context_relevance: f64,
    pub novelty_boost: f64,
    pub total: f64,
}

/// Base recency half-life before `temporal_focus` shifts it.
const RECENCY_BASE_HALF_LIFE_HOURS: f64 = 72.0;
/// Half-life governing how fast "newness" novelty fades.
const NOVELTY_HALF_LIFE_HOURS: f64 = 72.0;
/// Divisor shaping the access-count -> frequency_boost saturation curve.
const FREQUENCY_SCALE: f64 = 50.0;

pub struct SalienceEngine {
    config: SalienceConfig,
    decay: DecayEngine,
}

impl SalienceEngine {
    pub fn new(config: SalienceConfig, decay: DecayEngine) -> Self {
        Self { config, decay }
    }

    /// Score `entity` against `context`, returning the full breakdown.
    pub fn score(&self, entity: &Entity, context: &SalienceContext) -> SalienceBreakdown {
        let now = context.now.unwrap_or_else(Utc::now);

        let base_importance = (self.decay.effective_importance(entity, now) / 10.0).clamp(0.0, 1.0);
        let recency_boost = self.recency_boost(entity, now, context.temporal_focus);
        let frequency_boost = self.frequency_boost(entity);
        let context_relevance = self.context_relevance(entity, context);
        let novelty_boost = self.novelty_boost(entity, now);

        let total = self.config.weight_importance * base_importance
            + self.config.weight_recency * recency_boost
            + self.config.weight_frequency * frequency_boost
            + self.config.weight_context * context_relevance
            + self.config.weight_novelty * novelty_boost;

        SalienceBreakdown {
            base_importance,
            recency_boost,
            frequency_boost,
            context_relevance,
            novelty_boost,
            total: total.clamp(0.0, 1.0),
        }
    }

    fn recency_boost(&self, entity: &Entity, now: DateTime<Utc>, focus: TemporalFocus) -> f64 {
        let reference = entity
            .agent
            .as_ref()
            .and_then(|a| a.last_accessed_at)
            .unwrap_or(entity.created_at);
        let age_hours = now.signed_duration_since(reference).num_seconds().max(0) as f64 / 3600.0;
        let half_life = match focus {
            TemporalFocus::Recent => RECENCY_BASE_HALF_LIFE_HOURS / 2.0,
            TemporalFocus::Balanced => RECENCY_BASE_HALF_LIFE_HOURS,
            TemporalFocus::Historical => RECENCY_BASE_HALF_LIFE_HOURS * 2.0,
        };
        (-std::f64::consts::LN_2 * age_hours / half_life).exp().clamp(0.0, 1.0)
    }

    fn frequency_boost(&self, entity: &Entity) -> f64 {
        let access_count = entity.agent.as_ref().map(|a| a.access_count).unwrap_or(0);
        (1.0 - (-(access_count as f64) / FREQUENCY_SCALE).exp()).clamp(0.0, 1.0)
    }

    fn context_relevance(&self, entity: &Entity, context: &SalienceContext) -> f64 {
        let mut relevance: f64 = 0.0;

        if let (Some(task_id), Some(agent)) = (&context.current_task_id, &entity.agent) {
            if agent.task_id.as_deref() == Some(task_id.as_str()) {
                relevance = relevance.max(1.0);
            }
        }
        if let (Some(session_id), Some(agent)) = (&context.current_session_id, &entity.agent) {
            if agent.session_id.as_deref() == Some(session_id.as_str()) {
                relevance = relevance.max(self.config.session_boost_factor.clamp(0.0, 1.0));
            }
        }
        if context.recent_entity_names.contains(&entity.name) {
            relevance = relevance.max(self.config.recent_entity_boost_factor.clamp(0.0, 1.0));
        }
        if self.config.use_semantic_similarity {
            if let Some(query_text) = &context.query_text {
                relevance = relevance.max(token_overlap_similarity(query_text, &entity.document_text()));
            }
        }

        relevance.clamp(0.0, 1.0)
    }

    fn novelty_boost(&self, entity: &Entity, now: DateTime<Utc>) -> f64 {
        let age_hours = now
            .signed_duration_since(entity.created_at)
            .num_seconds()
            .max(0) as f64
            / 3600.0;
        let time_novelty = (-std::f64::consts::LN_2 * age_hours / NOVELTY_HALF_LIFE_HOURS).exp();

        let access_count = entity.agent.as_ref().map(|a| a.access_count).unwrap_or(0);
        let frequency_novelty = (-(access_count as f64) / FREQUENCY_SCALE).exp();

        let uniqueness = observation_uniqueness(&entity.observations);

        (0.5 * time_novelty + 0.3 * frequency_novelty + 0.2 * uniqueness).clamp(0.0, 1.0)
    }
}

/// Jaccard-based text overlap, used as a cheap stand-in for a full cosine
/// similarity when the caller only has raw query/document text.
fn token_overlap_similarity(a: &str, b: &str) -> f64 {
    let a: HashSet<String> = tokenize(a).into_iter().collect();
    let b: HashSet<String> = tokenize(b).into_iter().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(&b).count() as f64;
    let union = a.union(&b).count() as f64;
    intersection / union
}

/// Average pairwise `1 - Jaccard` distance among an entity's own
/// observations. Fewer than two
/// observations is maximally unique by convention.
fn observation_uniqueness(observations: &[String]) -> f64 {
    if observations.len() < 2 {
        return 1.0;
    }
    let sets: Vec<HashSet<String>> = observations
        .iter()
        .map(|obs| tokenize(obs).into_iter().collect())
        .collect();

    let mut total = 0.0;
    let mut pairs = 0usize;
    for i in 0..sets.len() {
        for j in (i + 1)..sets.len() {
            let (a, b) = (&sets[i], &sets[j]);
            let union = a.union(b).count();
            let distance = if union == 0 {
                0.0
            } else {
                1.0 - (a.intersection(b).count() as f64 / union as f64)
            };
            total += distance;
            pairs += 1;
        }
    }
    if pairs == 0 {
        1.0
    } else {
        total / pairs as f64
    }
}
