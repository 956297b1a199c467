//! Graph Store
//!
//! Durable ordered mapping of entities and relations with O(1) lookup
//! indexes and change-event publication. This module owns all entity and
//! relation records exclusively; every other component treats it as the
//! single source of truth and only ever caches entity *names*, never
//! entity references.

pub mod entity;
pub mod relation;
pub mod store;

pub use entity::{AgentFields, Entity, MemoryType, SessionFields, SessionStatus, Visibility};
pub use relation::Relation;
pub use store::{EntityPatch, Graph, GraphStore, GraphStoreConfig};
