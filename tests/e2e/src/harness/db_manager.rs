//! Test database manager
//!
//! Provides isolated [`Gnosis`] instances for testing: temporary graph
//! files that are cleaned up automatically, plus seeding helpers for
//! common entity populations.

use std::path::PathBuf;

use gnosis_core::{Entity, Gnosis, GnosisConfig};
use tempfile::TempDir;

/// Manager for test graph stores.
///
/// Creates an isolated [`Gnosis`] instance per test to prevent
/// interference between tests running in the same process.
pub struct TestDatabaseManager {
    pub gnosis: Gnosis,
    _temp_dir: Option<TempDir>,
    graph_path: PathBuf,
}

impl TestDatabaseManager {
    /// Create a new test store rooted in a fresh temporary directory.
    /// The directory is deleted when the manager is dropped.
    pub fn new_temp() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let graph_path = temp_dir.path().join("graph.jsonl");
        let gnosis =
            Gnosis::open(graph_path.clone(), GnosisConfig::default()).expect("failed to open test store");

        Self {
            gnosis,
            _temp_dir: Some(temp_dir),
            graph_path,
        }
    }

    /// Create a test store with a given configuration (e.g. a short
    /// decay half-life for deterministic decay tests).
    pub fn new_temp_with_config(config: GnosisConfig) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let graph_path = temp_dir.path().join("graph.jsonl");
        let gnosis = Gnosis::open(graph_path.clone(), config).expect("failed to open test store");

        Self {
            gnosis,
            _temp_dir: Some(temp_dir),
            graph_path,
        }
    }

    /// Create a test store at a specific path; not automatically deleted.
    pub fn new_at_path(path: PathBuf) -> Self {
        let gnosis =
            Gnosis::open(path.clone(), GnosisConfig::default()).expect("failed to open test store");
        Self {
            gnosis,
            _temp_dir: None,
            graph_path: path,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.graph_path
    }

    pub fn is_empty(&self) -> bool {
        self.gnosis.store().entity_count() == 0
    }

    pub fn entity_count(&self) -> usize {
        self.gnosis.store().entity_count()
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    /// Seed with `count` plain entities, round-robinning over a small
    /// set of tags so filtered queries have something to match.
    pub fn seed_entities(&mut self, count: usize) -> Vec<String> {
        let mut names = Vec::with_capacity(count);
        for i in 0..count {
            let mut entity = Entity::new(format!("Entity{i}"), "fact");
            entity.add_observations([format!("test observation number {i}")]);
            entity.tags.insert(format!("tag-{}", i % 5));
            if let Ok(created) = self.gnosis.create_entity(entity) {
                names.push(created.name);
            }
        }
        names
    }

    /// Seed with entities spread across a diverse set of entity types.
    pub fn seed_diverse(&mut self, count_per_type: usize) -> Vec<String> {
        let types = ["person", "organization", "location", "event", "concept"];
        let mut names = Vec::with_capacity(count_per_type * types.len());
        for entity_type in types {
            for i in 0..count_per_type {
                let mut entity = Entity::new(format!("{entity_type}-{i}"), entity_type);
                entity.add_observations([format!("a {entity_type} observation {i}")]);
                if let Ok(created) = self.gnosis.create_entity(entity) {
                    names.push(created.name);
                }
            }
        }
        names
    }

    /// Seed with entities spanning the importance range, for decay and
    /// salience tests.
    pub fn seed_with_importance_spread(&mut self) -> Vec<String> {
        let mut names = Vec::new();
        for (label, importance) in [("low", 1.0), ("medium", 5.0), ("high", 9.0)] {
            let mut entity = Entity::new(format!("Importance-{label}"), "fact");
            entity.importance = importance;
            entity.add_observations([format!("entity with {label} importance")]);
            if let Ok(created) = self.gnosis.create_entity(entity) {
                names.push(created.name);
            }
        }
        names
    }

    // ------------------------------------------------------------------
    // Cleanup
    // ------------------------------------------------------------------

    /// Delete every entity currently in the graph.
    pub fn clear(&mut self) {
        for entity in self.gnosis.store().all_entities() {
            let _ = self.gnosis.delete_entity(&entity.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_database_starts_empty() {
        let db = TestDatabaseManager::new_temp();
        assert!(db.is_empty());
    }

    #[test]
    fn seed_entities_creates_the_requested_count() {
        let mut db = TestDatabaseManager::new_temp();
        let names = db.seed_entities(10);
        assert_eq!(names.len(), 10);
        assert_eq!(db.entity_count(), 10);
    }

    #[test]
    fn seed_diverse_covers_every_type() {
        let mut db = TestDatabaseManager::new_temp();
        let names = db.seed_diverse(3);
        assert_eq!(names.len(), 15);
        assert_eq!(db.entity_count(), 15);
    }

    #[test]
    fn clear_empties_the_graph() {
        let mut db = TestDatabaseManager::new_temp();
        db.seed_entities(5);
        assert_eq!(db.entity_count(), 5);
        db.clear();
        assert!(db.is_empty());
    }
}
