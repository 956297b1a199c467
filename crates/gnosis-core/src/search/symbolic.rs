//! Symbolic layer search.
//!
//! Filters are ANDed; each matched filter contributes to a score in
//! [0, 1].

use crate::graph::Entity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportanceRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Filters considered by symbolic search; every `Some` field must match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolicFilters {
    pub tags: Option<Vec<String>>,
    pub entity_types: Option<Vec<String>>,
    pub importance: Option<ImportanceRange>,
    pub date_range: Option<DateRange>,
    pub has_observations: Option<bool>,
}

impl SymbolicFilters {
    pub fn is_empty(&self) -> bool {
        self.tags.is_none()
            && self.entity_types.is_none()
            && self.importance.is_none()
            && self.date_range.is_none()
            && self.has_observations.is_none()
    }
}

/// One filter's match outcome, for reporting `matched_filters`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchedFilter {
    Tags,
    EntityTypes,
    Importance,
    DateRange,
    HasObservations,
}

fn score_tags(filter: &[String], tags: &BTreeSet<String>) -> bool {
    let wanted: BTreeSet<String> = filter.iter().map(|t| t.to_lowercase()).collect();
    wanted.iter().any(|t| tags.contains(t))
}

fn score_entity_types(filter: &[String], entity_type: &str) -> bool {
    let entity_type_lower = entity_type.to_lowercase();
    filter.iter().any(|t| t.to_lowercase() == entity_type_lower)
}

fn score_importance(range: &ImportanceRange, importance: f64) -> bool {
    let effective = importance;
    range.min.is_none_or(|min| effective >= min) && range.max.is_none_or(|max| effective <= max)
}

fn score_date_range(range: &DateRange, created_at: DateTime<Utc>) -> bool {
    range.start.is_none_or(|start| created_at >= start)
        && range.end.is_none_or(|end| created_at <= end)
}

/// Match `entity` against `filters`, returning `(score, matched_filters)`
/// when every present filter matches, or `None` otherwise.
pub fn matches(entity: &Entity, filters: &SymbolicFilters) -> Option<(f64, Vec<MatchedFilter>)> {
    let mut matched = Vec::new();
    let mut considered = 0usize;

    if let Some(tags) = &filters.tags {
        considered += 1;
        if !score_tags(tags, &entity.tags) {
            return None;
        }
        matched.push(MatchedFilter::Tags);
    }
    if let Some(entity_types) = &filters.entity_types {
        considered += 1;
        if !score_entity_types(entity_types, &entity.entity_type) {
            return None;
        }
        matched.push(MatchedFilter::EntityTypes);
    }
    if let Some(importance) = &filters.importance {
        considered += 1;
        if !score_importance(importance, entity.importance) {
            return None;
        }
        matched.push(MatchedFilter::Importance);
    }
    if let Some(date_range) = &filters.date_range {
        considered += 1;
        if !score_date_range(date_range, entity.created_at) {
            return None;
        }
        matched.push(MatchedFilter::DateRange);
    }
    if let Some(has_observations) = filters.has_observations {
        considered += 1;
        if (!entity.observations.is_empty()) != has_observations {
            return None;
        }
        matched.push(MatchedFilter::HasObservations);
    }

    if considered == 0 {
        // No filters supplied: the orchestrator applies a baseline 0.5
        // score at the combination stage, not here.
        return Some((1.0, matched));
    }

    Some((matched.len() as f64 / considered as f64, matched))
}

/// Search `entities` against `filters`.
pub fn search(
    entities: &[Entity],
    filters: &SymbolicFilters,
) -> Vec<(Entity, f64, Vec<MatchedFilter>)> {
    entities
        .iter()
        .filter_map(|entity| matches(entity, filters).map(|(score, matched)| (entity.clone(), score, matched)))
        .collect()
}
