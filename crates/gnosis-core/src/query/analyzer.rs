//! Query Analyzer.
//!
//! New logic in the crate's own idiom, mirroring the teacher's
//! `advanced/intent.rs` heuristic-classifier style: keyword tables plus
//! confidence scoring rather than a real NLP pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A parsed or relative temporal range extracted from the query text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TemporalRange {
    Relative(String),
    Absolute {
        start: Option<String>,
        end: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Factual,
    Temporal,
    Comparative,
    Aggregation,
    Conceptual,
    MultiHop,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequiredInfoType {
    Person,
    Location,
    Temporal,
    Quantity,
}

/// Result of analyzing a raw query string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub persons: Vec<String>,
    pub locations: Vec<String>,
    pub organizations: Vec<String>,
    pub temporal_range: Option<TemporalRange>,
    pub question_type: QuestionType,
    pub complexity: Complexity,
    pub confidence: f64,
    pub required_info_types: BTreeSet<RequiredInfoType>,
    pub sub_queries: Option<Vec<String>>,
}

const TITLES: &[&str] = &["dr.", "mr.", "mrs.", "ms.", "prof."];
const LOCATION_PREPOSITIONS: &[&str] = &["in", "at", "from", "to", "near"];
const ORG_SUFFIXES: &[&str] = &["inc.", "inc", "corp.", "corp", "llc", "ltd.", "ltd"];
const RELATIVE_TEMPORAL_PHRASES: &[&str] = &[
    "yesterday",
    "today",
    "last day",
    "this day",
    "last week",
    "this week",
    "last month",
    "this month",
    "last year",
    "this year",
];

fn is_capitalized(word: &str) -> bool {
    word.chars().next().is_some_and(|c| c.is_uppercase())
}

fn strip_punctuation(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric())
}

/// Analyze `query`, producing the fields spec.md §4.6 specifies.
pub fn analyze(query: &str) -> QueryAnalysis {
    let words: Vec<&str> = query.split_whitespace().collect();
    let lower_words: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();

    let mut persons = Vec::new();
    for (i, word) in words.iter().enumerate() {
        let clean = strip_punctuation(word);
        if clean.is_empty() {
            continue;
        }
        let after_title = i > 0 && TITLES.contains(&lower_words[i - 1].as_str());
        if after_title || (is_capitalized(clean) && i > 0) {
            if !persons.contains(&clean.to_string()) {
                persons.push(clean.to_string());
            }
        }
    }

    let mut locations = Vec::new();
    for (i, word) in lower_words.iter().enumerate() {
        if LOCATION_PREPOSITIONS.contains(&word.as_str()) {
            if let Some(next) = words.get(i + 1) {
                let clean = strip_punctuation(next);
                if !clean.is_empty() && is_capitalized(clean) {
                    locations.push(clean.to_string());
                }
            }
        }
    }

    let mut organizations = Vec::new();
    for (i, word) in lower_words.iter().enumerate() {
        if ORG_SUFFIXES.contains(&word.as_str()) && i > 0 {
            let clean = strip_punctuation(words[i - 1]);
            if !clean.is_empty() {
                organizations.push(clean.to_string());
            }
        }
    }

    let query_lower = query.to_lowercase();
    let temporal_range = RELATIVE_TEMPORAL_PHRASES
        .iter()
        .find(|phrase| query_lower.contains(*phrase))
        .map(|phrase| TemporalRange::Relative(phrase.to_string()))
        .or_else(|| parse_iso_dates(&query_lower));

    let question_type = classify_question_type(&query_lower);

    let entity_count = persons.len() + locations.len() + organizations.len();
    let complexity = classify_complexity(words.len(), entity_count);
    let confidence = match complexity {
        Complexity::Low => 0.9,
        Complexity::Medium => 0.65,
        Complexity::High => 0.4,
    };

    let mut required_info_types = BTreeSet::new();
    if query_lower.contains("who") {
        required_info_types.insert(RequiredInfoType::Person);
    }
    if query_lower.contains("where") {
        required_info_types.insert(RequiredInfoType::Location);
    }
    if query_lower.contains("when") {
        required_info_types.insert(RequiredInfoType::Temporal);
    }
    if query_lower.contains("how many") || query_lower.contains("how much") {
        required_info_types.insert(RequiredInfoType::Quantity);
    }

    let sub_queries = split_sub_queries(query);

    QueryAnalysis {
        persons,
        locations,
        organizations,
        temporal_range,
        question_type,
        complexity,
        confidence,
        required_info_types,
        sub_queries,
    }
}

fn parse_iso_dates(query_lower: &str) -> Option<TemporalRange> {
    let iso_like = query_lower
        .split_whitespace()
        .find(|w| w.len() == 10 && w.as_bytes()[4] == b'-' && w.as_bytes()[7] == b'-');
    iso_like.map(|date| TemporalRange::Absolute {
        start: Some(date.to_string()),
        end: None,
    })
}

fn classify_question_type(query_lower: &str) -> QuestionType {
    if query_lower.contains("and then") {
        QuestionType::MultiHop
    } else if query_lower.contains("how many") || query_lower.contains("how much") {
        QuestionType::Aggregation
    } else if query_lower.contains("compare") || query_lower.contains("versus") || query_lower.contains(" vs ") {
        QuestionType::Comparative
    } else if query_lower.contains("when") || query_lower.contains("yesterday") || query_lower.contains("last week") {
        QuestionType::Temporal
    } else if query_lower.contains("explain") || query_lower.contains("why") || query_lower.contains("how does") {
        QuestionType::Conceptual
    } else if query_lower.starts_with("what") || query_lower.starts_with("who") || query_lower.starts_with("where") {
        QuestionType::Factual
    } else {
        QuestionType::Factual
    }
}

fn classify_complexity(word_count: usize, entity_count: usize) -> Complexity {
    let score = word_count + entity_count * 2;
    if score <= 6 {
        Complexity::Low
    } else if score <= 14 {
        Complexity::Medium
    } else {
        Complexity::High
    }
}

/// Splits a query into sub-queries when it contains "and then" or
/// joining "and" between clauses.
fn split_sub_queries(query: &str) -> Option<Vec<String>> {
    if query.to_lowercase().contains("and then") {
        return Some(
            query
                .split("and then")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        );
    }
    let lower = query.to_lowercase();
    if lower.contains(" and ") && query.split_whitespace().count() > 8 {
        return Some(
            query
                .split(" and ")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        );
    }
    None
}
