//! Query Analyzer + Planner.

pub mod analyzer;
pub mod planner;

pub use analyzer::{analyze, Complexity, QueryAnalysis, QuestionType, RequiredInfoType, TemporalRange};
pub use planner::{plan, ExecutionPlan, ExecutionStrategy, MergeStrategy, SubQueryPlan, TargetLayer};
