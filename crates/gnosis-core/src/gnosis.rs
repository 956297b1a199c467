//! The top-level facade: wires the graph store, its two search indexes,
//! the transaction manager, the hybrid search orchestrator, and the
//! agent-memory layer together behind one handle, constructed once from
//! a single entry point.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;

use crate::cache::CacheStats;
use crate::config::GnosisConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::graph::{Entity, EntityPatch, GraphStore, GraphStoreConfig, Relation};
use crate::index::{TfIdfIndex, VectorStore};
use crate::memory::{
    AccessPattern, AccessTracker, ContextWindowManager, DecayEngine, ForgetReport, PackResult,
    ReinforceOptions, SalienceContext, SalienceEngine,
};
use crate::search::{HybridOptions, HybridOrchestrator, ReflectionOptions, ReflectionReport, SearchResponse};
use crate::txn::TransactionManager;

/// Adequacy threshold below which `reflective_search` keeps iterating;
/// not part of `GnosisConfig` because it is a search-call concern, not a
/// process-wide tunable, but a sane process-wide default is still needed
/// for plain `search`.
const DEFAULT_ADEQUACY_THRESHOLD: f64 = 0.6;

fn sibling(path: &Path, file_name: &str) -> PathBuf {
    path.parent()
        .map(|dir| dir.join(file_name))
        .unwrap_or_else(|| PathBuf::from(file_name))
}

/// One open knowledge-graph store: the durable graph (C1), its two
/// search indexes (C3, C4), the transaction manager (C2), the hybrid
/// search orchestrator (C6-C8), and the agent-memory layer (C9-C11).
///
/// Everything is constructed once at [`Gnosis::open`] time from a
/// [`GnosisConfig`]; there is no hidden mutable module-level state.
pub struct Gnosis {
    store: Arc<GraphStore>,
    index: Arc<TfIdfIndex>,
    vectors: Arc<AsyncMutex<VectorStore>>,
    txn: Arc<TransactionManager>,
    access: Arc<AccessTracker>,
    decay: DecayEngine,
    salience: SalienceEngine,
    context_window: ContextWindowManager,
    orchestrator: HybridOrchestrator,
    config: GnosisConfig,
}

impl Gnosis {
    /// Open (creating if absent) a graph store rooted at `path`, with the
    /// given configuration. `path` is the primary JSONL graph file; the
    /// TF/IDF index and backups directory are derived as siblings of it.
    pub fn open(path: impl Into<PathBuf>, config: GnosisConfig) -> Result<Self> {
        let path = path.into();
        let store = Arc::new(GraphStore::open(GraphStoreConfig { path: path.clone() })?);

        let index_path = sibling(&path, "index.json");
        let index = Arc::new(TfIdfIndex::open(index_path, &store)?);
        Arc::clone(&index).spawn_subscriber(store.events(), Arc::clone(&store));

        let mut vector_store = VectorStore::new(config.vector_store.clone());
        seed_vector_store(&mut vector_store, &store);
        let vectors = Arc::new(AsyncMutex::new(vector_store));
        spawn_vector_subscriber(Arc::clone(&vectors), store.events(), Arc::clone(&store));

        let backups_dir = sibling(&path, "backups");
        let txn = Arc::new(TransactionManager::new(Arc::clone(&store), backups_dir));

        let access = Arc::new(AccessTracker::new(
            Arc::clone(&store),
            config.decay.recent_access_window,
        ));
        let decay = DecayEngine::new(config.decay.clone());
        let salience = SalienceEngine::new(config.salience.clone(), DecayEngine::new(config.decay.clone()));
        let context_window = ContextWindowManager::new(config.context_window.clone());
        let orchestrator = HybridOrchestrator::new(&config.caches, DEFAULT_ADEQUACY_THRESHOLD);

        Ok(Self {
            store,
            index,
            vectors,
            txn,
            access,
            decay,
            salience,
            context_window,
            orchestrator,
            config,
        })
    }

    /// Open at the platform-appropriate default location
    /// ([`GraphStoreConfig::default_path`]) with default configuration.
    pub fn open_default() -> Result<Self> {
        Self::open(GraphStoreConfig::default_path(), GnosisConfig::default())
    }

    pub fn config(&self) -> &GnosisConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    pub fn transactions(&self) -> &Arc<TransactionManager> {
        &self.txn
    }

    pub fn access_tracker(&self) -> &Arc<AccessTracker> {
        &self.access
    }

    /// Create an entity directly (outside a transaction), for simple
    /// single-operation call sites; equivalent to a one-operation batch.
    pub fn create_entity(&self, entity: Entity) -> Result<Entity> {
        self.store.append_entity(entity)
    }

    pub fn create_relation(&self, relation: Relation) -> Result<Relation> {
        self.store.append_relation(relation)
    }

    pub fn update_entity(&self, name: &str, patch: EntityPatch) -> Result<Entity> {
        self.store.update_entity(name, patch)
    }

    pub fn delete_entity(&self, name: &str) -> Result<()> {
        self.store.delete_entity(name)
    }

    pub fn get_entity(&self, name: &str) -> Option<Entity> {
        self.store.get_by_name(name)
    }

    /// Run the hybrid search pipeline.
    pub async fn search(&self, query: &str, options: &HybridOptions) -> SearchResponse {
        let vectors = self.vectors.lock().await;
        self.orchestrator
            .search(&self.store, &self.index, &vectors, query, options)
            .await
    }

    /// Run the reflective search loop.
    pub async fn reflective_search(
        &self,
        query: &str,
        options: &HybridOptions,
        reflection: &ReflectionOptions,
    ) -> ReflectionReport {
        let vectors = self.vectors.lock().await;
        self.orchestrator
            .reflective_search(&self.store, &self.index, &vectors, query, options, reflection)
            .await
    }

    pub fn plan_cache_stats(&self) -> CacheStats {
        self.orchestrator.plan_cache_stats()
    }

    /// Record an access for the agent-memory layer (C9), bumping
    /// `access_count`/`last_accessed_at`.
    pub fn record_access(&self, name: &str, session_id: Option<&str>) -> Result<Entity> {
        self.access.record_access(name, session_id)
    }

    pub fn access_pattern(&self, name: &str) -> AccessPattern {
        self.access.pattern(name)
    }

    /// Effective importance after decay.
    pub fn effective_importance(&self, entity: &Entity, now: chrono::DateTime<chrono::Utc>) -> f64 {
        self.decay.effective_importance(entity, now)
    }

    pub fn reinforce(&self, name: &str, options: ReinforceOptions) -> Result<Entity> {
        self.decay.reinforce(&self.store, name, options)
    }

    pub fn select_for_forgetting(
        &self,
        threshold: f64,
        older_than_hours: Option<f64>,
        exclude_tags: &[String],
        dry_run: bool,
    ) -> Result<ForgetReport> {
        self.decay
            .select_for_forgetting(&self.store, threshold, older_than_hours, exclude_tags, dry_run)
    }

    /// Salience score for one entity against a retrieval context.
    pub fn salience(&self, entity: &Entity, context: &SalienceContext) -> crate::memory::SalienceBreakdown {
        self.salience.score(entity, context)
    }

    /// Pack the highest-salience entities into a token budget. Scores every entity against `context`, then
    /// delegates the packing decision itself to [`ContextWindowManager`].
    pub fn pack_context(
        &self,
        context: &SalienceContext,
        must_include: &[String],
        max_tokens: u32,
        min_salience: f64,
    ) -> PackResult {
        let must_include: std::collections::BTreeSet<&str> =
            must_include.iter().map(String::as_str).collect();
        let mut candidates = Vec::new();
        for entity in self.store.all_entities() {
            let salience = self.salience(&entity, context).total;
            let is_must_include = must_include.contains(entity.name.as_str());
            candidates.push(crate::memory::PackingCandidate {
                entity,
                salience,
                must_include: is_must_include,
            });
        }
        self.context_window.pack(candidates, Some(max_tokens), min_salience)
    }

    /// Retire a disabled/rebuilt-bulk-load state: force both indexes to
    /// resync from the graph. Used after a caller disables the event bus
    /// for a bulk import and re-enables it.
    pub async fn resync_indexes(&self) -> Result<()> {
        self.index.rebuild(&self.store);
        self.index.save()?;
        let mut vectors = self.vectors.lock().await;
        resync_vector_store(&mut vectors, &self.store);
        Ok(())
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.store.events()
    }
}

/// Populate the vector store from whatever entities already exist on
/// open. Embedding generation needs the `embeddings` feature; without
/// it the vector store starts empty and semantic search degrades to the
/// empty-map layer result documented in spec.md §7.
fn seed_vector_store(vectors: &mut VectorStore, store: &GraphStore) {
    #[cfg(feature = "embeddings")]
    {
        let service = crate::embeddings::EmbeddingService::new();
        if service.is_ready() {
            for entity in store.all_entities() {
                if let Ok(embedding) = service.embed(&entity.document_text()) {
                    let vector = crate::embeddings::matryoshka_truncate(embedding.vector);
                    let _ = vectors.upsert(&entity.name, vector);
                }
            }
            return;
        }
    }
    let _ = (vectors, store);
}

fn resync_vector_store(vectors: &mut VectorStore, store: &GraphStore) {
    #[cfg(feature = "embeddings")]
    {
        let service = crate::embeddings::EmbeddingService::new();
        if service.is_ready() {
            for name in store.all_entities().iter().map(|e| e.name.clone()).collect::<Vec<_>>() {
                let _ = vectors.remove(&name);
            }
            seed_vector_store(vectors, store);
            return;
        }
    }
    let _ = (vectors, store);
}

/// Keep the vector store consistent with the graph (C1) the same way
/// [`TfIdfIndex::spawn_subscriber`] keeps C3 consistent: C4 has no
/// subscriber of its own (it needs `&mut self` to mutate and, with the
/// `embeddings` feature, a blocking call into the embedding model), so
/// `Gnosis` owns the wiring instead of C4 wiring itself.
fn spawn_vector_subscriber(
    vectors: Arc<AsyncMutex<VectorStore>>,
    events: Arc<EventBus>,
    store: Arc<GraphStore>,
) {
    let mut subscription = events.subscribe();
    tokio::spawn(async move {
        use crate::events::ChangeEvent;
        while let Some(event) = subscription.recv().await {
            match event {
                ChangeEvent::EntityCreated { entity } => {
                    embed_and_upsert(&vectors, &entity.name, &entity.document_text()).await;
                }
                ChangeEvent::EntityUpdated { name, .. } | ChangeEvent::ObservationAdded { name, .. } => {
                    if let Some(entity) = store.get_by_name(&name) {
                        embed_and_upsert(&vectors, &name, &entity.document_text()).await;
                    }
                }
                ChangeEvent::EntityDeleted { name } => {
                    let mut guard = vectors.lock().await;
                    let _ = guard.remove(&name);
                }
                ChangeEvent::RelationCreated { .. } | ChangeEvent::RelationDeleted { .. } => {}
            }
        }
    });
}

async fn embed_and_upsert(vectors: &Arc<AsyncMutex<VectorStore>>, name: &str, text: &str) {
    #[cfg(feature = "embeddings")]
    {
        let service = crate::embeddings::EmbeddingService::new();
        if let Ok(embedding) = service.embed(text) {
            let vector = crate::embeddings::matryoshka_truncate(embedding.vector);
            let mut guard = vectors.lock().await;
            let _ = guard.upsert(name, vector);
            return;
        }
    }
    let _ = (vectors, name, text);
}

impl std::fmt::Debug for Gnosis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gnosis")
            .field("path", &self.store.path())
            .field("entity_count", &self.store.entity_count())
            .finish()
    }
}
