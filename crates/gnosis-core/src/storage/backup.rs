//! Backup layout: each backup is a payload
//! file (optionally Brotli-compressed, suffix `.br`) plus a sibling
//! metadata file. Used internally by the transaction manager (C2) for
//! backup-based rollback, and exposed for ad hoc snapshotting.

use crate::error::{Error, Result};
use crate::storage::jsonl;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Sidecar metadata describing one backup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    pub timestamp: DateTime<Utc>,
    pub description: Option<String>,
    pub entity_count: usize,
    pub relation_count: usize,
    pub compressed: bool,
    pub compression_format: Option<String>,
    /// compressed_size / original_size; 1.0 when uncompressed.
    pub compression_ratio: f64,
    pub original_size: u64,
    pub compressed_size: u64,
    pub file_size: u64,
    /// Path to the payload file, stored so `restore_backup` doesn't need
    /// to re-derive it from the metadata file name.
    pub payload_path: PathBuf,
}

const MIN_COMPRESSION_SIZE: usize = 256;

fn brotli_compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut writer = brotli::CompressorWriter::new(&mut out, 4096, 9, 22);
        writer.write_all(data).expect("in-memory write cannot fail");
    }
    out
}

fn brotli_decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut reader = brotli::Decompressor::new(data, 4096);
    reader
        .read_to_end(&mut out)
        .map_err(|e| Error::StorageFailure(format!("brotli decompress failed: {e}")))?;
    Ok(out)
}

fn timestamp_slug(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%S%.6f").to_string()
}

/// Create a backup of the graph file currently at `source_path`.
/// `entity_count`/`relation_count` are supplied by the caller (the
/// transaction manager already has the in-memory graph at hand, so it
/// doesn't need re-parsing here).
pub fn create_backup(
    source_path: &Path,
    backups_dir: &Path,
    description: Option<String>,
    entity_count: usize,
    relation_count: usize,
) -> Result<BackupMetadata> {
    std::fs::create_dir_all(backups_dir)?;
    let raw = jsonl::read_raw(source_path)?;
    let original_size = raw.len() as u64;
    let timestamp = Utc::now();
    let slug = timestamp_slug(timestamp);

    let try_compressed = raw.len() >= MIN_COMPRESSION_SIZE;
    let compressed_candidate = if try_compressed {
        Some(brotli_compress(&raw))
    } else {
        None
    };

    // Only keep the compressed form if it actually achieves a reasonable
    // ratio; otherwise store the payload uncompressed.
    let use_compression = match &compressed_candidate {
        Some(compressed) if original_size > 0 => {
            (compressed.len() as f64 / original_size as f64) <= 0.9
        }
        _ => false,
    };

    let (payload_bytes, compressed, compression_format): (&[u8], bool, Option<String>) =
        if use_compression {
            (
                compressed_candidate.as_deref().unwrap(),
                true,
                Some("brotli".to_string()),
            )
        } else {
            (&raw, false, None)
        };

    let payload_path = backups_dir.join(format!(
        "backup-{slug}.jsonl{}",
        if compressed { ".br" } else { "" }
    ));
    std::fs::write(&payload_path, payload_bytes)?;

    let compressed_size = payload_bytes.len() as u64;
    let metadata = BackupMetadata {
        timestamp,
        description,
        entity_count,
        relation_count,
        compressed,
        compression_format,
        compression_ratio: if original_size > 0 {
            compressed_size as f64 / original_size as f64
        } else {
            1.0
        },
        original_size,
        compressed_size,
        file_size: compressed_size,
        payload_path: payload_path.clone(),
    };

    let meta_path = metadata_path_for(backups_dir, &slug);
    std::fs::write(&meta_path, serde_json::to_vec_pretty(&metadata)?)?;

    Ok(metadata)
}

fn metadata_path_for(backups_dir: &Path, slug: &str) -> PathBuf {
    backups_dir.join(format!("backup-{slug}.meta.json"))
}

/// Restore `metadata`'s payload onto `dest_path` (whole-file replace).
pub fn restore_backup(metadata: &BackupMetadata, dest_path: &Path) -> Result<()> {
    let raw = std::fs::read(&metadata.payload_path)?;
    let bytes = if metadata.compressed {
        brotli_decompress(&raw)?
    } else {
        raw
    };
    jsonl::write_raw(dest_path, &bytes)
}

/// List backups in `backups_dir`, newest first.
pub fn list_backups(backups_dir: &Path) -> Result<Vec<BackupMetadata>> {
    let mut metadatas = Vec::new();
    let entries = match std::fs::read_dir(backups_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::Io(e)),
    };
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json")
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".meta.json"))
        {
            let bytes = std::fs::read(&path)?;
            let metadata: BackupMetadata = serde_json::from_slice(&bytes)?;
            metadatas.push(metadata);
        }
    }
    metadatas.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(metadatas)
}

/// Delete a single backup's payload and metadata files.
pub fn delete_backup(metadata: &BackupMetadata) -> Result<()> {
    let backups_dir = metadata
        .payload_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let slug = timestamp_slug(metadata.timestamp);
    let _ = std::fs::remove_file(&metadata.payload_path);
    let _ = std::fs::remove_file(metadata_path_for(&backups_dir, &slug));
    Ok(())
}

/// Delete all but the `keep_newest` most recent backups (payload + metadata).
pub fn apply_retention(backups_dir: &Path, keep_newest: usize) -> Result<usize> {
    let all = list_backups(backups_dir)?;
    let mut removed = 0;
    for metadata in all.into_iter().skip(keep_newest) {
        delete_backup(&metadata)?;
        removed += 1;
    }
    Ok(removed)
}
