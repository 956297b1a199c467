//! Persistence layer: the primary length-delimited JSONL format plus
//! backup creation/restore/retention, the storage
//! backend boundary, and the optional SQLite alternate backend.

pub mod backend;
pub mod backup;
pub mod jsonl;

#[cfg(feature = "sqlite-backend")]
pub mod migrations;
#[cfg(feature = "sqlite-backend")]
pub mod sqlite;

pub use backend::{GraphBackend, JsonlBackend};
pub use backup::{
    apply_retention, create_backup, delete_backup, list_backups, restore_backup, BackupMetadata,
};
pub use jsonl::{read_graph, write_graph};

#[cfg(feature = "sqlite-backend")]
pub use sqlite::SqliteBackend;
