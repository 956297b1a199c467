//! Agent-memory layer: access tracking and decay (C9), salience scoring
//! (C10), and context-window packing (C11) — spec.md §4.9-§4.11.

pub mod access;
pub mod context_window;
pub mod decay;
pub mod salience;

pub use access::{AccessPattern, AccessTracker};
pub use context_window::{
    ContextWindowManager, ExclusionReason, PackResult, PackingCandidate, PoolBudgets, SpilloverPage,
};
pub use decay::{DecayEngine, ForgetCandidate, ForgetReport, ReinforceOptions};
pub use salience::{SalienceBreakdown, SalienceContext, SalienceEngine, TemporalFocus};
