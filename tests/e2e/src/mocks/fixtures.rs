//! Test data factory
//!
//! Generates realistic entity/relation populations for journeys and
//! invariant tests: batches for volume testing, and pre-built scenarios
//! for search, decay, and context-packing tests.

use gnosis_core::{AgentFields, Entity, Gnosis, MemoryType, Relation};

/// Factory for creating test graphs with configurable shape.
pub struct TestDataFactory;

/// Configuration for batch entity generation.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub count: usize,
    pub entity_type: Option<String>,
    pub name_prefix: String,
    pub tags: Vec<String>,
    pub with_importance_spread: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            count: 10,
            entity_type: None,
            name_prefix: "Entity".to_string(),
            tags: vec![],
            with_importance_spread: false,
        }
    }
}

/// Names and metadata produced by a scenario builder, for use in test
/// assertions.
#[derive(Debug, Default)]
pub struct TestScenario {
    pub entity_names: Vec<String>,
    pub description: String,
    pub metadata: std::collections::HashMap<String, String>,
}

impl TestDataFactory {
    // ------------------------------------------------------------------
    // Single entity creation
    // ------------------------------------------------------------------

    pub fn create_entity(gnosis: &Gnosis, name: &str, observation: &str) -> Option<Entity> {
        let mut entity = Entity::new(name, "fact");
        entity.add_observations([observation.to_string()]);
        gnosis.create_entity(entity).ok()
    }

    pub fn create_entity_full(
        gnosis: &Gnosis,
        name: &str,
        entity_type: &str,
        observations: Vec<&str>,
        tags: Vec<&str>,
        importance: f64,
    ) -> Option<Entity> {
        let mut entity = Entity::new(name, entity_type);
        entity.add_observations(observations.into_iter().map(String::from));
        for tag in tags {
            entity.tags.insert(tag.to_lowercase());
        }
        entity.importance = importance;
        gnosis.create_entity(entity).ok()
    }

    /// Create a working-memory agent entity, as produced mid-session.
    pub fn create_working_memory(
        gnosis: &Gnosis,
        name: &str,
        session_id: &str,
        observation: &str,
    ) -> Option<Entity> {
        let mut entity = Entity::new(name, "observation");
        entity.add_observations([observation.to_string()]);
        entity.agent = Some(AgentFields {
            memory_type: MemoryType::Working,
            session_id: Some(session_id.to_string()),
            ..AgentFields::default()
        });
        gnosis.create_entity(entity).ok()
    }

    // ------------------------------------------------------------------
    // Batch creation
    // ------------------------------------------------------------------

    pub fn create_batch(gnosis: &Gnosis, count: usize) -> Vec<String> {
        Self::create_batch_with_config(gnosis, BatchConfig { count, ..Default::default() })
    }

    pub fn create_batch_with_config(gnosis: &Gnosis, config: BatchConfig) -> Vec<String> {
        let types = ["fact", "person", "organization", "location", "event"];
        let mut names = Vec::with_capacity(config.count);

        for i in 0..config.count {
            let entity_type = config
                .entity_type
                .clone()
                .unwrap_or_else(|| types[i % types.len()].to_string());

            let importance = if config.with_importance_spread {
                (i as f64 / config.count.max(1) as f64) * 10.0
            } else {
                5.0
            };

            let mut entity = Entity::new(format!("{}-{i}", config.name_prefix), entity_type);
            entity.add_observations([format!("{} observation {i}", config.name_prefix)]);
            for tag in &config.tags {
                entity.tags.insert(tag.to_lowercase());
            }
            entity.importance = importance;

            if let Ok(created) = gnosis.create_entity(entity) {
                names.push(created.name);
            }
        }

        names
    }

    // ------------------------------------------------------------------
    // Scenarios
    // ------------------------------------------------------------------

    /// Three entities spanning the importance range, for decay and
    /// salience comparisons.
    pub fn create_decay_scenario(gnosis: &Gnosis) -> TestScenario {
        let mut names = Vec::new();
        let mut metadata = std::collections::HashMap::new();

        if let Some(e) = Self::create_entity_full(
            gnosis,
            "HighImportance",
            "fact",
            vec!["rarely changes, frequently reinforced"],
            vec!["stable"],
            9.0,
        ) {
            metadata.insert("high_importance".to_string(), e.name.clone());
            names.push(e.name);
        }

        if let Some(e) = Self::create_entity_full(
            gnosis,
            "LowImportance",
            "fact",
            vec!["a detail learned once"],
            vec!["volatile"],
            1.0,
        ) {
            metadata.insert("low_importance".to_string(), e.name.clone());
            names.push(e.name);
        }

        TestScenario {
            entity_names: names,
            description: "decay scenario with a high- and low-importance entity".to_string(),
            metadata,
        }
    }

    /// Three topical clusters of entities, for testing that lexical and
    /// semantic search separate unrelated clusters.
    pub fn create_search_scenario(gnosis: &Gnosis) -> TestScenario {
        let mut names = Vec::new();
        let mut metadata = std::collections::HashMap::new();

        let programming = [
            "Rust uses ownership for memory safety without a garbage collector",
            "Python is popular for data science and machine learning",
            "JavaScript runs in web browsers and on Node.js",
        ];
        for (i, content) in programming.iter().enumerate() {
            if let Some(e) = Self::create_entity_full(
                gnosis,
                &format!("Programming{i}"),
                "fact",
                vec![content],
                vec!["programming", "tech"],
                5.0,
            ) {
                names.push(e.name);
            }
        }
        metadata.insert("programming_count".to_string(), programming.len().to_string());

        let science = [
            "Mitochondria produce most of a cell's ATP",
            "DNA encodes the genetic instructions for an organism",
            "Gravity is the attractive force between masses",
        ];
        for (i, content) in science.iter().enumerate() {
            if let Some(e) = Self::create_entity_full(
                gnosis,
                &format!("Science{i}"),
                "fact",
                vec![content],
                vec!["science"],
                5.0,
            ) {
                names.push(e.name);
            }
        }
        metadata.insert("science_count".to_string(), science.len().to_string());

        TestScenario {
            entity_names: names,
            description: "search scenario with programming and science clusters".to_string(),
            metadata,
        }
    }

    /// A small social graph (people, an organization, and relations
    /// between them) for relation/cascade tests.
    pub fn create_social_graph(gnosis: &Gnosis) -> TestScenario {
        let mut names = Vec::new();

        for name in ["Alice", "Bob"] {
            if let Some(e) = Self::create_entity_full(
                gnosis,
                name,
                "person",
                vec!["works in engineering"],
                vec!["tech"],
                5.0,
            ) {
                names.push(e.name);
            }
        }
        if let Some(e) =
            Self::create_entity_full(gnosis, "TechCorp", "organization", vec!["a software company"], vec![], 5.0)
        {
            names.push(e.name);
        }

        let _ = gnosis.create_relation(Relation::new("Alice", "TechCorp", "works_at"));
        let _ = gnosis.create_relation(Relation::new("Bob", "TechCorp", "works_at"));
        let _ = gnosis.create_relation(Relation::new("Alice", "Bob", "knows"));

        TestScenario {
            entity_names: names,
            description: "social graph with works_at and knows relations".to_string(),
            metadata: std::collections::HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::db_manager::TestDatabaseManager;

    #[test]
    fn create_batch_produces_requested_count() {
        let db = TestDatabaseManager::new_temp();
        let names = TestDataFactory::create_batch(&db.gnosis, 7);
        assert_eq!(names.len(), 7);
        assert_eq!(db.entity_count(), 7);
    }

    #[test]
    fn decay_scenario_has_both_importance_tiers() {
        let db = TestDatabaseManager::new_temp();
        let scenario = TestDataFactory::create_decay_scenario(&db.gnosis);
        assert_eq!(scenario.entity_names.len(), 2);
        assert!(scenario.metadata.contains_key("high_importance"));
        assert!(scenario.metadata.contains_key("low_importance"));
    }

    #[test]
    fn social_graph_links_people_to_an_organization() {
        let db = TestDatabaseManager::new_temp();
        let scenario = TestDataFactory::create_social_graph(&db.gnosis);
        assert_eq!(scenario.entity_names.len(), 3);
        assert_eq!(db.gnosis.store().relations_from("Alice").len(), 2);
    }
}
