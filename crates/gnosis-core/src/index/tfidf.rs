//! TF/IDF Index.
//!
//! Inverted index plus per-document term frequencies and a global IDF
//! table, kept consistent with the graph store by subscribing to its
//! change events. The teacher has no lexical index of its own (FTS5 is
//! delegated to SQLite there), so this is new logic in the crate's own
//! idiom, versioned and persisted as a single file the way the teacher
//! versions its SQLite schema in `storage/migrations.rs`.

use crate::error::{Error, Result};
use crate::events::{ChangeEvent, EventBus};
use crate::graph::store::GraphStore;
use crate::text::tokenize;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Bumped whenever the on-disk shape changes; a mismatch on load triggers
/// a full rebuild from the graph.
pub const INDEX_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DocumentEntry {
    terms: HashMap<String, u32>,
    document_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedIndex {
    version: u32,
    last_updated: DateTime<Utc>,
    documents: HashMap<String, DocumentEntry>,
    idf: HashMap<String, f64>,
}

struct State {
    documents: HashMap<String, DocumentEntry>,
    /// token -> document frequency, derived but kept incrementally rather
    /// than recomputed from `documents` on every query.
    doc_freq: HashMap<String, u32>,
    idf: HashMap<String, f64>,
    last_updated: DateTime<Utc>,
}

impl State {
    fn empty() -> Self {
        Self {
            documents: HashMap::new(),
            doc_freq: HashMap::new(),
            idf: HashMap::new(),
            last_updated: Utc::now(),
        }
    }

    fn recompute_idf_for(&mut self, tokens: impl IntoIterator<Item = String>) {
        let n = self.documents.len().max(1) as f64;
        for token in tokens {
            let df = *self.doc_freq.get(&token).unwrap_or(&0);
            if df == 0 {
                self.idf.remove(&token);
            } else {
                self.idf.insert(token, (n / df as f64).ln());
            }
        }
    }

    fn recompute_idf_all(&mut self) {
        let tokens: Vec<String> = self.doc_freq.keys().cloned().collect();
        self.recompute_idf_for(tokens);
    }

    fn add_document(&mut self, name: &str, document_text: &str) {
        let tokens = tokenize(document_text);
        let mut terms: HashMap<String, u32> = HashMap::new();
        for token in &tokens {
            *terms.entry(token.clone()).or_insert(0) += 1;
        }
        for token in terms.keys() {
            *self.doc_freq.entry(token.clone()).or_insert(0) += 1;
        }
        self.documents.insert(
            name.to_string(),
            DocumentEntry {
                terms,
                document_text: document_text.to_string(),
            },
        );
        // N changed: every token's IDF is potentially stale.
        self.recompute_idf_all();
        self.last_updated = Utc::now();
    }

    fn remove_document(&mut self, name: &str) {
        if let Some(entry) = self.documents.remove(name) {
            for token in entry.terms.keys() {
                if let Some(df) = self.doc_freq.get_mut(token) {
                    *df = df.saturating_sub(1);
                    if *df == 0 {
                        self.doc_freq.remove(token);
                    }
                }
            }
            self.recompute_idf_all();
            self.last_updated = Utc::now();
        }
    }

    /// N is unchanged; only tokens added or removed by the diff need new IDF.
    fn update_document(&mut self, name: &str, document_text: &str) {
        let old_tokens: std::collections::HashSet<String> = self
            .documents
            .get(name)
            .map(|e| e.terms.keys().cloned().collect())
            .unwrap_or_default();

        let tokens = tokenize(document_text);
        let mut terms: HashMap<String, u32> = HashMap::new();
        for token in &tokens {
            *terms.entry(token.clone()).or_insert(0) += 1;
        }
        let new_tokens: std::collections::HashSet<String> = terms.keys().cloned().collect();

        for removed in old_tokens.difference(&new_tokens) {
            if let Some(df) = self.doc_freq.get_mut(removed) {
                *df = df.saturating_sub(1);
                if *df == 0 {
                    self.doc_freq.remove(removed);
                }
            }
        }
        for added in new_tokens.difference(&old_tokens) {
            *self.doc_freq.entry(added.clone()).or_insert(0) += 1;
        }

        self.documents.insert(
            name.to_string(),
            DocumentEntry {
                terms,
                document_text: document_text.to_string(),
            },
        );

        let changed: Vec<String> = old_tokens.symmetric_difference(&new_tokens).cloned().collect();
        self.recompute_idf_for(changed);
        self.last_updated = Utc::now();
    }

    fn score(&self, name: &str, query_tokens: &[String]) -> f64 {
        let Some(entry) = self.documents.get(name) else {
            return 0.0;
        };
        query_tokens
            .iter()
            .map(|t| {
                let tf = *entry.terms.get(t).unwrap_or(&0) as f64;
                let idf = *self.idf.get(t).unwrap_or(&0.0);
                tf * idf
            })
            .sum()
    }
}

/// The TF/IDF index, kept consistent with a [`GraphStore`] via its
/// change-event bus.
pub struct TfIdfIndex {
    path: PathBuf,
    state: RwLock<State>,
}

impl TfIdfIndex {
    /// Load from `path` if present and the version matches; otherwise
    /// rebuild wholesale from `store`.
    pub fn open(path: PathBuf, store: &GraphStore) -> Result<Self> {
        let state = match Self::load_persisted(&path)? {
            Some(state) => state,
            None => Self::rebuild_from_graph(store),
        };
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    fn rebuild_from_graph(store: &GraphStore) -> State {
        let mut state = State::empty();
        for entity in store.all_entities() {
            state.add_document(&entity.name, &entity.document_text());
        }
        state
    }

    fn load_persisted(path: &Path) -> Result<Option<State>> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };
        let persisted: PersistedIndex = match serde_json::from_slice(&bytes) {
            Ok(p) => p,
            Err(_) => return Ok(None),
        };
        if persisted.version != INDEX_VERSION {
            return Err(Error::IndexStale {
                on_disk: persisted.version,
                expected: INDEX_VERSION,
            });
        }
        let mut state = State::empty();
        state.documents = persisted.documents;
        for entry in state.documents.values() {
            for token in entry.terms.keys() {
                *state.doc_freq.entry(token.clone()).or_insert(0) += 1;
            }
        }
        state.idf = persisted.idf;
        state.last_updated = persisted.last_updated;
        Ok(Some(state))
    }

    /// Persist the index to `self.path`, whole-file replace.
    pub fn save(&self) -> Result<()> {
        let state = self.state.read().expect("tfidf index lock poisoned");
        let persisted = PersistedIndex {
            version: INDEX_VERSION,
            last_updated: state.last_updated,
            documents: state.documents.clone(),
            idf: state.idf.clone(),
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec(&persisted)?;
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }

    /// Timestamp of the most recent mutation, persisted alongside the
    /// index so the on-disk file matches spec.md §6's `{version,
    /// last_updated, documents, idf}` shape.
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.state.read().expect("tfidf index lock poisoned").last_updated
    }

    pub fn add_document(&self, name: &str, document_text: &str) {
        self.state
            .write()
            .expect("tfidf index lock poisoned")
            .add_document(name, document_text);
    }

    pub fn update_document(&self, name: &str, document_text: &str) {
        self.state
            .write()
            .expect("tfidf index lock poisoned")
            .update_document(name, document_text);
    }

    pub fn remove_document(&self, name: &str) {
        self.state
            .write()
            .expect("tfidf index lock poisoned")
            .remove_document(name);
    }

    /// `Σ tf(t,d) · idf(t)` over the tokens of `query`, for every indexed
    /// document.
    pub fn score_all(&self, query: &str) -> Vec<(String, f64)> {
        let state = self.state.read().expect("tfidf index lock poisoned");
        let query_tokens = tokenize(query);
        state
            .documents
            .keys()
            .map(|name| (name.clone(), state.score(name, &query_tokens)))
            .collect()
    }

    pub fn document_text(&self, name: &str) -> Option<String> {
        self.state
            .read()
            .expect("tfidf index lock poisoned")
            .documents
            .get(name)
            .map(|e| e.document_text.clone())
    }

    pub fn document_count(&self) -> usize {
        self.state.read().expect("tfidf index lock poisoned").documents.len()
    }

    /// Apply one change event to keep the index consistent with the graph.
    fn apply_event(&self, event: &ChangeEvent, store: &GraphStore) {
        match event {
            ChangeEvent::EntityCreated { entity } => {
                self.add_document(&entity.name, &entity.document_text());
            }
            ChangeEvent::EntityUpdated { name, .. } | ChangeEvent::ObservationAdded { name, .. } => {
                if let Some(entity) = store.get_by_name(name) {
                    self.update_document(name, &entity.document_text());
                }
            }
            ChangeEvent::EntityDeleted { name } => {
                self.remove_document(name);
            }
            ChangeEvent::RelationCreated { .. } | ChangeEvent::RelationDeleted { .. } => {}
        }
    }

    /// Spawn a background task that applies events from `events` until
    /// the bus is dropped. The subscription can be disabled on `events`
    /// for bulk loads; callers should call [`TfIdfIndex::rebuild`] after
    /// re-enabling to guard against staleness.
    pub fn spawn_subscriber(self: Arc<Self>, events: Arc<EventBus>, store: Arc<GraphStore>) {
        let mut subscription = events.subscribe();
        tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                self.apply_event(&event, &store);
            }
        });
    }

    /// Full rebuild check: used after bulk loads to guarantee the index
    /// is not stale relative to the graph.
    pub fn rebuild(&self, store: &GraphStore) {
        let mut state = self.state.write().expect("tfidf index lock poisoned");
        *state = Self::rebuild_from_graph(store);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::store::GraphStoreConfig;
    use crate::graph::Entity;
    use tempfile::tempdir;

    fn temp_index() -> (TfIdfIndex, GraphStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let graph_path = dir.path().join("graph.jsonl");
        let store = GraphStore::open(GraphStoreConfig { path: graph_path }).unwrap();
        let index_path = dir.path().join("index.json");
        let index = TfIdfIndex::open(index_path, &store).unwrap();
        (index, store, dir)
    }

    #[test]
    fn scores_favor_documents_with_more_matching_terms() {
        let (index, _store, _dir) = temp_index();
        index.add_document("Alice", "alice software engineer loves rust programming");
        index.add_document("Bob", "bob works in sales");

        let scores = index.score_all("rust programming");
        let alice = scores.iter().find(|(n, _)| n == "Alice").unwrap().1;
        let bob = scores.iter().find(|(n, _)| n == "Bob").unwrap().1;
        assert!(alice > bob);
    }

    #[test]
    fn remove_document_drops_it_from_scoring() {
        let (index, _store, _dir) = temp_index();
        index.add_document("Alice", "alice loves rust");
        index.remove_document("Alice");
        assert_eq!(index.document_count(), 0);
    }

    #[test]
    fn update_document_changes_terms_without_duplicating_entry() {
        let (index, _store, _dir) = temp_index();
        index.add_document("Alice", "alice likes coffee");
        index.update_document("Alice", "alice likes tea");
        assert_eq!(index.document_count(), 1);
        assert_eq!(index.document_text("Alice").unwrap(), "alice likes tea");
    }

    #[test]
    fn stale_version_on_disk_errors() {
        let dir = tempdir().unwrap();
        let index_path = dir.path().join("index.json");
        std::fs::write(
            &index_path,
            serde_json::json!({
                "version": 9999,
                "last_updated": "2024-01-01T00:00:00Z",
                "documents": {},
                "idf": {},
            })
            .to_string(),
        )
        .unwrap();
        let graph_path = dir.path().join("graph.jsonl");
        let store = GraphStore::open(GraphStoreConfig { path: graph_path }).unwrap();
        let err = TfIdfIndex::open(index_path, &store).unwrap_err();
        assert!(matches!(err, Error::IndexStale { .. }));
    }

    #[test]
    fn rebuild_picks_up_entities_already_in_the_graph() {
        let dir = tempdir().unwrap();
        let graph_path = dir.path().join("graph.jsonl");
        let store = GraphStore::open(GraphStoreConfig { path: graph_path }).unwrap();
        store.append_entity(Entity::new("Alice", "person")).unwrap();
        let index_path = dir.path().join("index.json");
        let index = TfIdfIndex::open(index_path, &store).unwrap();
        assert_eq!(index.document_count(), 1);
    }
}
