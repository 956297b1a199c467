//! Graph Store implementation.

use super::entity::{AgentFields, Entity, SessionFields};
use super::relation::Relation;
use crate::error::{Error, Result};
use crate::events::{ChangeEvent, EventBus, Subscription};
use crate::storage::jsonl;
use crate::text::tokenize;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Keys dropped from any metadata patch before merging, guarding against
/// prototype-pollution-style key collisions with reserved object names.
const RESERVED_METADATA_KEYS: &[&str] = &["__proto__", "constructor", "prototype"];

/// Plain (entities, relations) tuple. No indexes, no
/// event bus — this is the unit that transactions clone, mutate, and
/// persist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
}

/// A patch applied to an existing entity via [`GraphStore::update_entity`].
/// `None` means "leave unchanged"; `parent_id` uses a double option so a
/// patch can explicitly clear the parent (`Some(None)`) versus leaving it
/// untouched (`None`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityPatch {
    pub entity_type: Option<String>,
    #[serde(default)]
    pub add_observations: Vec<String>,
    #[serde(default)]
    pub remove_observations: Vec<String>,
    pub tags: Option<BTreeSet<String>>,
    pub importance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Option<String>>,
    #[serde(default)]
    pub metadata_patch: serde_json::Map<String, serde_json::Value>,
    /// Agent-memory field group: `None` leaves it unchanged, `Some(None)`
    /// clears it, `Some(Some(fields))` replaces it wholesale. Read-modify-
    /// write by callers (C9 access tracker/decay engine) rather than a
    /// granular per-field patch, since `GraphStore` already serializes
    /// concurrent mutation through its internal mutex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<Option<AgentFields>>,
    /// Session field group, same double-option convention as `agent`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Option<SessionFields>>,
}

impl Graph {
    /// True if `candidate_parent`'s ancestor chain eventually reaches
    /// `entity_name` — i.e. setting `entity_name.parent_id = candidate_parent`
    /// would create a cycle.
    pub fn would_create_cycle(&self, entity_name: &str, candidate_parent: &str) -> bool {
        let mut current = candidate_parent.to_string();
        let mut seen = BTreeSet::new();
        loop {
            if current == entity_name {
                return true;
            }
            if !seen.insert(current.clone()) {
                // Existing cycle elsewhere in the graph; don't loop forever.
                return false;
            }
            match self.entities.iter().find(|e| e.name == current) {
                Some(e) => match &e.parent_id {
                    Some(parent) => current = parent.clone(),
                    None => return false,
                },
                None => return false,
            }
        }
    }

    pub fn find_entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn find_entity_mut(&mut self, name: &str) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.name == name)
    }

    /// Insert a new entity; fails if the name is already taken.
    pub fn insert_entity(&mut self, entity: Entity) -> Result<ChangeEvent> {
        entity.validate()?;
        if self.find_entity(&entity.name).is_some() {
            return Err(Error::DuplicateEntity(entity.name.clone()));
        }
        let event = ChangeEvent::EntityCreated {
            entity: entity.clone(),
        };
        self.entities.push(entity);
        Ok(event)
    }

    /// Apply a patch to an existing entity in place.
    pub fn update_entity(&mut self, name: &str, patch: &EntityPatch) -> Result<ChangeEvent> {
        // Cycle check must happen before mutation, using the pre-patch graph.
        if let Some(Some(new_parent)) = &patch.parent_id {
            if new_parent == name {
                return Err(Error::CycleDetected {
                    entity: name.to_string(),
                    parent: new_parent.clone(),
                });
            }
            if self.would_create_cycle(name, new_parent) {
                return Err(Error::CycleDetected {
                    entity: name.to_string(),
                    parent: new_parent.clone(),
                });
            }
        }

        let entity = self
            .find_entity_mut(name)
            .ok_or_else(|| Error::EntityNotFound(name.to_string()))?;

        if let Some(entity_type) = &patch.entity_type {
            if entity_type.trim().is_empty() {
                return Err(Error::Validation("entity_type must not be empty".into()));
            }
            entity.entity_type = entity_type.clone();
        }
        if !patch.add_observations.is_empty() {
            entity.add_observations(patch.add_observations.iter().cloned());
        }
        if !patch.remove_observations.is_empty() {
            entity.remove_observations(&patch.remove_observations);
        }
        if let Some(tags) = &patch.tags {
            entity.tags = tags.iter().map(|t| t.to_lowercase()).collect();
        }
        if let Some(importance) = patch.importance {
            if !(0.0..=10.0).contains(&importance) {
                return Err(Error::InvalidImportance(importance));
            }
            entity.importance = importance;
        }
        if let Some(parent) = &patch.parent_id {
            entity.parent_id = parent.clone();
        }
        if let Some(agent) = &patch.agent {
            entity.agent = agent.clone();
        }
        if let Some(session) = &patch.session {
            entity.session = session.clone();
        }
        for key in RESERVED_METADATA_KEYS {
            if patch.metadata_patch.contains_key(*key) {
                tracing::warn!(key = *key, "dropping reserved metadata key from patch");
            }
        }
        for (k, v) in &patch.metadata_patch {
            if RESERVED_METADATA_KEYS.contains(&k.as_str()) {
                continue;
            }
            entity.metadata.insert(k.clone(), v.clone());
        }
        entity.last_modified = chrono::Utc::now();

        Ok(ChangeEvent::EntityUpdated {
            name: name.to_string(),
            patch: serde_json::to_value(patch).unwrap_or(serde_json::Value::Null),
        })
    }

    /// Delete an entity, cascading to every relation that references it
    /// in either direction.
    pub fn delete_entity(&mut self, name: &str) -> Result<Vec<ChangeEvent>> {
        let idx = self
            .entities
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| Error::EntityNotFound(name.to_string()))?;
        self.entities.remove(idx);

        let mut events = vec![ChangeEvent::EntityDeleted {
            name: name.to_string(),
        }];

        let mut i = 0;
        while i < self.relations.len() {
            if self.relations[i].from == name || self.relations[i].to == name {
                let r = self.relations.remove(i);
                events.push(ChangeEvent::RelationDeleted {
                    from: r.from,
                    to: r.to,
                    relation_type: r.relation_type,
                });
            } else {
                i += 1;
            }
        }
        Ok(events)
    }

    pub fn insert_relation(&mut self, relation: Relation) -> Result<ChangeEvent> {
        relation.validate()?;
        let key = relation.key();
        if self.relations.iter().any(|r| r.key() == key) {
            return Err(Error::DuplicateRelation {
                from: key.0,
                to: key.1,
                relation_type: key.2,
            });
        }
        let event = ChangeEvent::RelationCreated {
            relation: relation.clone(),
        };
        self.relations.push(relation);
        Ok(event)
    }

    pub fn delete_relation(&mut self, from: &str, to: &str, relation_type: &str) -> Result<ChangeEvent> {
        let idx = self
            .relations
            .iter()
            .position(|r| r.from == from && r.to == to && r.relation_type == relation_type)
            .ok_or_else(|| Error::RelationNotFound {
                from: from.to_string(),
                to: to.to_string(),
                relation_type: relation_type.to_string(),
            })?;
        self.relations.remove(idx);
        Ok(ChangeEvent::RelationDeleted {
            from: from.to_string(),
            to: to.to_string(),
            relation_type: relation_type.to_string(),
        })
    }
}

/// Derived, never-authoritative lookup indexes.
/// Rebuilt wholesale on every load/save; at embedded-store scale this is
/// cheaper than tracking incremental deltas correctly.
struct Indexes {
    by_type: HashMap<String, Vec<String>>,
    name_lower: HashMap<String, String>,
    relations_from: HashMap<String, Vec<usize>>,
    relations_to: HashMap<String, Vec<usize>>,
    inverted: HashMap<String, BTreeSet<String>>,
}

impl Indexes {
    fn build(graph: &Graph) -> Self {
        let mut by_type: HashMap<String, Vec<String>> = HashMap::new();
        let mut name_lower = HashMap::new();
        let mut inverted: HashMap<String, BTreeSet<String>> = HashMap::new();

        for entity in &graph.entities {
            by_type
                .entry(entity.type_key())
                .or_default()
                .push(entity.name.clone());
            name_lower.insert(entity.name.clone(), entity.name_lower());
            for token in tokenize(&entity.document_text()) {
                inverted.entry(token).or_default().insert(entity.name.clone());
            }
        }

        let mut relations_from: HashMap<String, Vec<usize>> = HashMap::new();
        let mut relations_to: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, relation) in graph.relations.iter().enumerate() {
            relations_from.entry(relation.from.clone()).or_default().push(idx);
            relations_to.entry(relation.to.clone()).or_default().push(idx);
        }

        Self {
            by_type,
            name_lower,
            relations_from,
            relations_to,
            inverted,
        }
    }
}

/// Construction options for a [`GraphStore`].
#[derive(Debug, Clone)]
pub struct GraphStoreConfig {
    pub path: PathBuf,
}

impl GraphStoreConfig {
    /// Platform-appropriate default path, mirroring the teacher's
    /// `directories`-based default database location.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("io", "gnosis", "gnosis")
            .map(|dirs| dirs.data_dir().join("graph.jsonl"))
            .unwrap_or_else(|| PathBuf::from("gnosis-graph.jsonl"))
    }
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
        }
    }
}

struct GraphState {
    graph: Graph,
    indexes: Indexes,
}

/// The durable graph store (C1). Cheap to clone handles of via `Arc`;
/// internally guarded by a single mutex since embedded-store graphs are
/// small enough that lock contention is not a practical concern (mirrors
/// the teacher's `Mutex<Connection>` approach in `storage/sqlite.rs`).
pub struct GraphStore {
    path: PathBuf,
    state: Mutex<GraphState>,
    events: Arc<EventBus>,
}

impl GraphStore {
    /// Open (creating if absent) the graph store at `config.path`.
    pub fn open(config: GraphStoreConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let graph = jsonl::read_graph(&config.path)?;
        let indexes = Indexes::build(&graph);
        Ok(Self {
            path: config.path,
            state: Mutex::new(GraphState { graph, indexes }),
            events: Arc::new(EventBus::new()),
        })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    /// Re-read the on-disk file, replacing the in-memory snapshot.
    pub fn load(&self) -> Result<Graph> {
        let graph = jsonl::read_graph(&self.path)?;
        let indexes = Indexes::build(&graph);
        let mut state = self.state.lock().expect("graph store mutex poisoned");
        state.graph = graph.clone();
        state.indexes = indexes;
        Ok(graph)
    }

    /// Whole-file replace write of `graph`, rebuilding indexes.
    /// Does not publish events — callers that need per-operation events
    /// (the transaction manager) publish them themselves via
    /// [`GraphStore::publish`] after a successful save.
    pub fn save(&self, graph: Graph) -> Result<()> {
        jsonl::write_graph(&self.path, &graph)?;
        let indexes = Indexes::build(&graph);
        let mut state = self.state.lock().expect("graph store mutex poisoned");
        state.graph = graph;
        state.indexes = indexes;
        Ok(())
    }

    pub fn publish(&self, event: ChangeEvent) {
        self.events.publish(event);
    }

    /// A writable deep copy for staging a transaction against.
    pub fn get_graph_for_mutation(&self) -> Graph {
        self.state.lock().expect("graph store mutex poisoned").graph.clone()
    }

    pub fn get_by_name(&self, name: &str) -> Option<Entity> {
        self.state
            .lock()
            .expect("graph store mutex poisoned")
            .graph
            .find_entity(name)
            .cloned()
    }

    /// Case-insensitive lookup by entity type, in insertion order.
    pub fn get_by_type(&self, entity_type: &str) -> Vec<Entity> {
        let state = self.state.lock().expect("graph store mutex poisoned");
        let key = entity_type.to_lowercase();
        match state.indexes.by_type.get(&key) {
            Some(names) => names
                .iter()
                .filter_map(|n| state.graph.find_entity(n).cloned())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn relations_from(&self, name: &str) -> Vec<Relation> {
        let state = self.state.lock().expect("graph store mutex poisoned");
        match state.indexes.relations_from.get(name) {
            Some(idxs) => idxs.iter().filter_map(|i| state.graph.relations.get(*i).cloned()).collect(),
            None => Vec::new(),
        }
    }

    pub fn relations_to(&self, name: &str) -> Vec<Relation> {
        let state = self.state.lock().expect("graph store mutex poisoned");
        match state.indexes.relations_to.get(name) {
            Some(idxs) => idxs.iter().filter_map(|i| state.graph.relations.get(*i).cloned()).collect(),
            None => Vec::new(),
        }
    }

    /// Walk the session chain starting at `start`: the `previous_session_id`
    /// ancestor link is followed first, then — for each session visited —
    /// `related_session_ids` entries are followed only when the candidate's
    /// own `previous_session_id` points back at the session being expanded.
    /// That asymmetry (trust the backward link, verify the forward list
    /// against it) is preserved from the source this was distilled from
    /// rather than re-derived, since a naive "follow both lists" traversal
    /// would happily walk into a session whose `related_session_ids` entry
    /// is stale or one-sided.
    pub fn session_chain(&self, start: &str) -> Vec<Entity> {
        let mut visited = BTreeSet::new();
        let mut order = Vec::new();
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(start.to_string());
        visited.insert(start.to_string());

        while let Some(name) = queue.pop_front() {
            let Some(entity) = self.get_by_name(&name) else {
                continue;
            };
            let Some(session) = entity.session.clone() else {
                order.push(entity);
                continue;
            };

            if let Some(previous) = &session.previous_session_id {
                if visited.insert(previous.clone()) {
                    queue.push_back(previous.clone());
                }
            }
            for related in &session.related_session_ids {
                if visited.contains(related) {
                    continue;
                }
                let points_back = self
                    .get_by_name(related)
                    .and_then(|candidate| candidate.session)
                    .and_then(|fields| fields.previous_session_id)
                    .is_some_and(|prev| prev == name);
                if points_back {
                    visited.insert(related.clone());
                    queue.push_back(related.clone());
                }
            }

            order.push(entity);
        }

        order
    }

    /// Token membership lookup against the graph's own cheap inverted
    /// index (distinct from the richer C3 TF/IDF index).
    pub fn entities_with_token(&self, token: &str) -> BTreeSet<String> {
        self.state
            .lock()
            .expect("graph store mutex poisoned")
            .indexes
            .inverted
            .get(token)
            .cloned()
            .unwrap_or_default()
    }

    pub fn all_entities(&self) -> Vec<Entity> {
        self.state.lock().expect("graph store mutex poisoned").graph.entities.clone()
    }

    pub fn entity_count(&self) -> usize {
        self.state.lock().expect("graph store mutex poisoned").graph.entities.len()
    }

    // ------------------------------------------------------------------
    // Direct (non-transactional) convenience mutators. Each persists
    // immediately and publishes its own event; the transaction manager
    // (C2) instead stages against a cloned `Graph` and calls
    // `commit_mutated_graph` once, to get backup/rollback semantics.
    // ------------------------------------------------------------------

    pub fn append_entity(&self, entity: Entity) -> Result<Entity> {
        let mut graph = self.get_graph_for_mutation();
        let event = graph.insert_entity(entity.clone())?;
        self.save(graph)?;
        self.publish(event);
        Ok(entity)
    }

    pub fn append_relation(&self, relation: Relation) -> Result<Relation> {
        let mut graph = self.get_graph_for_mutation();
        let event = graph.insert_relation(relation.clone())?;
        self.save(graph)?;
        self.publish(event);
        Ok(relation)
    }

    pub fn update_entity(&self, name: &str, patch: EntityPatch) -> Result<Entity> {
        let mut graph = self.get_graph_for_mutation();
        let event = graph.update_entity(name, &patch)?;
        let updated = graph.find_entity(name).cloned().expect("just updated");
        self.save(graph)?;
        self.publish(event);
        Ok(updated)
    }

    /// Read-modify-write helper for C9: apply `f` to a clone of the
    /// entity's current agent fields (defaulting if absent) and persist
    /// the result. Used for access tracking and reinforcement, where the
    /// caller only has a delta, not a full replacement value.
    pub fn update_agent_fields(
        &self,
        name: &str,
        f: impl FnOnce(&mut AgentFields),
    ) -> Result<Entity> {
        let current = self
            .get_by_name(name)
            .ok_or_else(|| Error::EntityNotFound(name.to_string()))?;
        let mut agent = current.agent.unwrap_or_default();
        f(&mut agent);
        self.update_entity(
            name,
            EntityPatch {
                agent: Some(Some(agent)),
                ..Default::default()
            },
        )
    }

    pub fn delete_entity(&self, name: &str) -> Result<()> {
        let mut graph = self.get_graph_for_mutation();
        let events = graph.delete_entity(name)?;
        self.save(graph)?;
        for event in events {
            self.publish(event);
        }
        Ok(())
    }

    pub fn delete_relation(&self, from: &str, to: &str, relation_type: &str) -> Result<()> {
        let mut graph = self.get_graph_for_mutation();
        let event = graph.delete_relation(from, to, relation_type)?;
        self.save(graph)?;
        self.publish(event);
        Ok(())
    }

    /// Used by the transaction manager: persist an already-mutated graph
    /// and publish its accumulated events, in order, in one call.
    pub(crate) fn commit_mutated_graph(&self, graph: Graph, events: Vec<ChangeEvent>) -> Result<()> {
        self.save(graph)?;
        for event in events {
            self.publish(event);
        }
        Ok(())
    }
}
