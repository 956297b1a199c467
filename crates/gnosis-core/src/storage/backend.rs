//! Storage backend boundary.
//!
//! `GraphStore` is hardwired to the length-delimited JSONL format in
//! [`crate::storage::jsonl`] for its default, always-available path. This
//! trait exists so an alternate backend — currently the feature-gated
//! `sqlite-backend` implementation in [`crate::storage::sqlite`] — can be
//! swapped in without touching `GraphStore`'s in-memory logic. It is not
//! wired as the active backend anywhere in this crate; `GraphStore` keeps
//! calling `jsonl::read_graph`/`write_graph` directly.

use crate::error::Result;
use crate::graph::store::Graph;

/// Whole-graph load/save, the same granularity `GraphStore` uses
/// internally: every mutation serializes the full in-memory [`Graph`]
/// and writes it out, rather than diffing individual entities/relations.
pub trait GraphBackend: Send + Sync {
    /// Load the full graph, or an empty one if no graph exists yet.
    fn load(&self) -> Result<Graph>;

    /// Persist the full graph, replacing whatever was there before.
    fn save(&self, graph: &Graph) -> Result<()>;
}

/// Adapts the default JSONL storage functions to [`GraphBackend`].
pub struct JsonlBackend {
    path: std::path::PathBuf,
}

impl JsonlBackend {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl GraphBackend for JsonlBackend {
    fn load(&self) -> Result<Graph> {
        super::jsonl::read_graph(&self.path)
    }

    fn save(&self, graph: &Graph) -> Result<()> {
        super::jsonl::write_graph(&self.path, graph)
    }
}
