//! Query Planner.
//!
//! Turns a [`QueryAnalysis`] into an execution plan the hybrid
//! orchestrator (C8) follows.

use super::analyzer::{Complexity, QueryAnalysis, QuestionType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    Iterative,
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    Weighted,
    Union,
    Intersection,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TargetLayer {
    Semantic,
    Lexical,
    Symbolic,
    Hybrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubQueryPlan {
    pub id: String,
    pub text: String,
    pub target_layer: TargetLayer,
    pub filters: serde_json::Value,
    pub depends_on: Vec<String>,
}

/// An execution plan produced from a [`QueryAnalysis`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub original_query: String,
    pub sub_queries: Vec<SubQueryPlan>,
    pub execution_strategy: ExecutionStrategy,
    pub merge_strategy: MergeStrategy,
    pub estimated_complexity: u8,
}

/// Build an [`ExecutionPlan`] from `query` and its [`QueryAnalysis`].
pub fn plan(query: &str, analysis: &QueryAnalysis) -> ExecutionPlan {
    let merge_strategy = match analysis.question_type {
        QuestionType::Aggregation => MergeStrategy::Union,
        QuestionType::Comparative => MergeStrategy::Intersection,
        _ => MergeStrategy::Weighted,
    };

    let sub_query_texts = analysis
        .sub_queries
        .clone()
        .unwrap_or_else(|| vec![query.to_string()]);

    let target_layer = if analysis.question_type == QuestionType::Temporal {
        TargetLayer::Symbolic
    } else if analysis.complexity == Complexity::High || analysis.question_type == QuestionType::Comparative {
        TargetLayer::Semantic
    } else {
        TargetLayer::Hybrid
    };

    let mut sub_queries = Vec::with_capacity(sub_query_texts.len());
    for (i, text) in sub_query_texts.iter().enumerate() {
        let id = format!("sq{i}");
        let filters = if analysis.question_type == QuestionType::Temporal {
            serde_json::json!({ "date_range": temporal_filter(analysis) })
        } else {
            serde_json::json!({})
        };
        let depends_on = if i > 0 && analysis.question_type == QuestionType::MultiHop {
            vec![format!("sq{}", i - 1)]
        } else {
            Vec::new()
        };
        sub_queries.push(SubQueryPlan {
            id,
            text: text.clone(),
            target_layer,
            filters,
            depends_on,
        });
    }

    let has_dependencies = sub_queries.iter().any(|sq| !sq.depends_on.is_empty());
    let execution_strategy = if sub_queries.len() == 1 {
        ExecutionStrategy::Iterative
    } else if has_dependencies {
        ExecutionStrategy::Sequential
    } else {
        ExecutionStrategy::Parallel
    };

    let estimated_complexity = match analysis.complexity {
        Complexity::Low => 2,
        Complexity::Medium => 5,
        Complexity::High => 9,
    };

    ExecutionPlan {
        original_query: query.to_string(),
        sub_queries,
        execution_strategy,
        merge_strategy,
        estimated_complexity,
    }
}

fn temporal_filter(analysis: &QueryAnalysis) -> serde_json::Value {
    match &analysis.temporal_range {
        Some(super::analyzer::TemporalRange::Relative(phrase)) => {
            serde_json::json!({ "relative": phrase })
        }
        Some(super::analyzer::TemporalRange::Absolute { start, end }) => {
            serde_json::json!({ "start": start, "end": end })
        }
        None => serde_json::Value::Null,
    }
}
