//! SQLite-backed [`GraphBackend`], gated behind the
//! `sqlite-backend` feature and off by default. Mirrors the connection
//! setup and migration pattern used elsewhere in this codebase for
//! embedded SQLite storage: WAL mode, a writer/reader connection pair
//! guarded by mutexes so `SqliteBackend` stays `Send + Sync`, and a
//! version-tracked migration table applied at open time.
//!
//! This is a storage-layer alternative, not the active backend:
//! `GraphStore` always reads and writes through [`crate::storage::jsonl`].
//! Swapping backends would mean constructing `GraphStore` with a
//! `Box<dyn GraphBackend>` instead of a hardcoded path, which is out of
//! scope here.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use super::backend::GraphBackend;
use super::migrations::apply_migrations;
use crate::error::{Error, Result};
use crate::graph::entity::{AgentFields, Entity, SessionFields};
use crate::graph::relation::Relation;
use crate::graph::store::Graph;

/// SQLite-backed graph storage: one row per entity, one row per relation.
pub struct SqliteBackend {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl SqliteBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let writer_conn = Connection::open(path).map_err(Error::Sqlite)?;
        Self::configure(&writer_conn)?;
        apply_migrations(&writer_conn).map_err(Error::Sqlite)?;

        let reader_conn = Connection::open(path).map_err(Error::Sqlite)?;
        Self::configure(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
        })
    }

    fn configure(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(Error::Sqlite)?;
        Ok(())
    }

    fn row_to_entity(row: &rusqlite::Row) -> rusqlite::Result<Entity> {
        let observations_json: String = row.get("observations")?;
        let tags_json: String = row.get("tags")?;
        let metadata_json: String = row.get("metadata")?;
        let agent_json: Option<String> = row.get("agent")?;
        let session_json: Option<String> = row.get("session")?;
        let created_at: String = row.get("created_at")?;
        let last_modified: String = row.get("last_modified")?;

        Ok(Entity {
            name: row.get("name")?,
            entity_type: row.get("entity_type")?,
            observations: serde_json::from_str(&observations_json).unwrap_or_default(),
            tags: serde_json::from_str(&tags_json).unwrap_or_default(),
            importance: row.get("importance")?,
            created_at: parse_timestamp(&created_at)?,
            last_modified: parse_timestamp(&last_modified)?,
            parent_id: row.get("parent_id")?,
            metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
            agent: agent_json.and_then(|j| serde_json::from_str::<AgentFields>(&j).ok()),
            session: session_json.and_then(|j| serde_json::from_str::<SessionFields>(&j).ok()),
        })
    }

    fn row_to_relation(row: &rusqlite::Row) -> rusqlite::Result<Relation> {
        let created_at: String = row.get("created_at")?;
        let last_modified: String = row.get("last_modified")?;
        Ok(Relation {
            from: row.get("from_name")?,
            to: row.get("to_name")?,
            relation_type: row.get("relation_type")?,
            created_at: parse_timestamp(&created_at)?,
            last_modified: parse_timestamp(&last_modified)?,
        })
    }
}

fn parse_timestamp(value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())),
            )
        })
}

impl GraphBackend for SqliteBackend {
    fn load(&self) -> Result<Graph> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| Error::StorageFailure("sqlite reader lock poisoned".into()))?;

        let mut entity_stmt = reader.prepare("SELECT * FROM entities").map_err(Error::Sqlite)?;
        let entities = entity_stmt
            .query_map([], Self::row_to_entity)
            .map_err(Error::Sqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::Sqlite)?;
        drop(entity_stmt);

        let mut relation_stmt = reader.prepare("SELECT * FROM relations").map_err(Error::Sqlite)?;
        let relations = relation_stmt
            .query_map([], Self::row_to_relation)
            .map_err(Error::Sqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::Sqlite)?;

        Ok(Graph { entities, relations })
    }

    fn save(&self, graph: &Graph) -> Result<()> {
        let writer = self
            .writer
            .lock()
            .map_err(|_| Error::StorageFailure("sqlite writer lock poisoned".into()))?;

        writer.execute("DELETE FROM relations", []).map_err(Error::Sqlite)?;
        writer.execute("DELETE FROM entities", []).map_err(Error::Sqlite)?;

        for entity in &graph.entities {
            let observations_json = serde_json::to_string(&entity.observations)?;
            let tags_json = serde_json::to_string(&entity.tags)?;
            let metadata_json = serde_json::to_string(&entity.metadata)?;
            let agent_json = entity
                .agent
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            let session_json = entity
                .session
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;

            writer
                .execute(
                    "INSERT INTO entities (
                        name, entity_type, observations, tags, importance,
                        created_at, last_modified, parent_id, metadata, agent, session
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        entity.name,
                        entity.entity_type,
                        observations_json,
                        tags_json,
                        entity.importance,
                        entity.created_at.to_rfc3339(),
                        entity.last_modified.to_rfc3339(),
                        entity.parent_id,
                        metadata_json,
                        agent_json,
                        session_json,
                    ],
                )
                .map_err(Error::Sqlite)?;
        }

        for relation in &graph.relations {
            writer
                .execute(
                    "INSERT INTO relations (from_name, to_name, relation_type, created_at, last_modified)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        relation.from,
                        relation.to,
                        relation.relation_type,
                        relation.created_at.to_rfc3339(),
                        relation.last_modified.to_rfc3339(),
                    ],
                )
                .map_err(Error::Sqlite)?;
        }

        Ok(())
    }
}

impl SqliteBackend {
    /// Look up a single entity by name without loading the whole graph,
    /// the one read path worth keeping connection-local rather than
    /// routed through [`GraphBackend::load`].
    pub fn find_entity(&self, name: &str) -> Result<Option<Entity>> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| Error::StorageFailure("sqlite reader lock poisoned".into()))?;
        reader
            .query_row(
                "SELECT * FROM entities WHERE name = ?1",
                params![name],
                Self::row_to_entity,
            )
            .optional()
            .map_err(Error::Sqlite)
    }
}
