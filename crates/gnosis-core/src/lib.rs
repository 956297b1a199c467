//! # Gnosis
//!
//! An embedded, single-process knowledge-graph store with hybrid search
//! (semantic, lexical, symbolic) and an agent-memory layer (access
//! tracking, exponential decay, salience scoring, token-budget context
//! packing).
//!
//! The crate has no network surface and no background process of its
//! own beyond the change-event subscriber tasks spawned by
//! [`Gnosis::open`]; everything else runs synchronously inside the
//! caller's process.
//!
//! ## Layout
//!
//! - [`graph`]: the durable graph store (entities, relations, indexes,
//!   change events) — the single source of truth every other component
//!   treats the graph as.
//! - [`txn`]: the transaction manager coordinating staged mutations
//!   against the graph with backup-based rollback.
//! - [`index`]: the TF/IDF lexical index and the quantized vector store,
//!   both kept consistent with the graph via its change-event bus.
//! - [`cache`]: the LRU+TTL cache used for the plan cache, the embedding
//!   cache, and the compressed-entity cache.
//! - [`query`]: query analysis (NER-ish heuristics, question typing) and
//!   execution planning.
//! - [`search`]: the three independent scoring layers plus the hybrid
//!   orchestrator that fuses them.
//! - [`memory`]: the agent-memory layer — access tracking, decay,
//!   salience scoring, and context-window packing.
//! - [`storage`]: the on-disk JSON Lines persistence format and backup
//!   layout.
//! - [`embeddings`] (feature `embeddings`): local ONNX embedding
//!   generation via fastembed.
//! - [`error`], [`events`], [`config`], [`text`]: shared ambient
//!   infrastructure used throughout.
//!
//! [`Gnosis`] is the single entry point that wires all of the above
//! together.

pub mod cache;
pub mod config;
#[cfg(feature = "embeddings")]
pub mod embeddings;
pub mod error;
pub mod events;
mod gnosis;
pub mod graph;
pub mod index;
pub mod memory;
pub mod query;
pub mod search;
pub mod storage;
pub mod text;
pub mod txn;

pub use config::{
    CacheConfig, ContextWindowConfig, DecayConfig, GnosisConfig, IndexerConfig, SalienceConfig,
    VectorStoreConfig,
};
#[cfg(feature = "embeddings")]
pub use embeddings::{Embedding, EmbeddingError, EmbeddingService};
pub use error::{Error, Result};
pub use events::{ChangeEvent, EventBus, Subscription};
pub use gnosis::Gnosis;
pub use graph::{
    AgentFields, Entity, EntityPatch, Graph, GraphStore, GraphStoreConfig, MemoryType, Relation,
    SessionFields, SessionStatus, Visibility,
};
pub use index::{TfIdfIndex, VectorStore, VectorStoreError, VectorStoreStats};
pub use memory::{
    AccessPattern, AccessTracker, ContextWindowManager, DecayEngine, ExclusionReason,
    ForgetCandidate, ForgetReport, PackResult, PackingCandidate, PoolBudgets, ReinforceOptions,
    SalienceBreakdown, SalienceContext, SalienceEngine, SpilloverPage, TemporalFocus,
};
pub use query::{
    analyze, plan, Complexity, ExecutionPlan, ExecutionStrategy, MergeStrategy, QueryAnalysis,
    QuestionType, RequiredInfoType, SubQueryPlan, TargetLayer, TemporalRange,
};
pub use search::{
    DateRange, HybridOptions, HybridOrchestrator, HybridResult, ImportanceRange, Layer,
    MatchedFilter, RankedMatch, ReflectionOptions, ReflectionReport, ReflectionStep,
    SearchResponse, SemanticMatch, SymbolicFilters,
};
pub use txn::{
    BatchOptions, BatchReport, Operation, OperationOutcome, TransactionManager, TxnState,
};
