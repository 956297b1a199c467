//! Primary persistence format:
//! length-delimited JSON records, one per line, entities first then
//! relations. Reading streams line by line; a missing file is an empty
//! graph. Writing is a whole-file replace so the backup mechanism (C2)
//! can treat a save as atomic from the outside.

use crate::error::{Error, Result};
use crate::graph::store::Graph;
use crate::graph::{Entity, Relation};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

const ENTITY_TAG: &str = "E";
const RELATION_TAG: &str = "R";

/// Read a graph from `path`. A missing file yields an empty graph.
pub fn read_graph(path: &Path) -> Result<Graph> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Graph::default()),
        Err(e) => return Err(Error::Io(e)),
    };

    let mut graph = Graph::default();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let (tag, rest) = line
            .split_once(' ')
            .ok_or_else(|| malformed(path, line_no))?;
        let (len_str, json) = rest
            .split_once(' ')
            .ok_or_else(|| malformed(path, line_no))?;
        let declared_len: usize = len_str
            .parse()
            .map_err(|_| malformed(path, line_no))?;
        if json.len() != declared_len {
            return Err(malformed(path, line_no));
        }
        match tag {
            ENTITY_TAG => {
                let entity: Entity = serde_json::from_str(json)?;
                graph.entities.push(entity);
            }
            RELATION_TAG => {
                let relation: Relation = serde_json::from_str(json)?;
                graph.relations.push(relation);
            }
            _ => return Err(malformed(path, line_no)),
        }
    }
    Ok(graph)
}

fn malformed(path: &Path, line_no: usize) -> Error {
    Error::StorageFailure(format!(
        "malformed graph record at {}:{}",
        path.display(),
        line_no + 1
    ))
}

/// Whole-file replace write: serialize to a temp file in the same
/// directory, then atomically rename over `path`.
pub fn write_graph(path: &Path, graph: &Graph) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = tmp_path_for(path);
    {
        let mut file = std::fs::File::create(&tmp_path)?;
        for entity in &graph.entities {
            write_record(&mut file, ENTITY_TAG, entity)?;
        }
        for relation in &graph.relations {
            write_record(&mut file, RELATION_TAG, relation)?;
        }
        file.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn write_record<T: serde::Serialize>(file: &mut std::fs::File, tag: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    writeln!(file, "{} {} {}", tag, json.len(), json)?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut tmp = path.to_path_buf();
    let file_name = tmp
        .file_name()
        .map(|n| format!("{}.tmp-{}", n.to_string_lossy(), std::process::id()))
        .unwrap_or_else(|| "gnosis-graph.tmp".to_string());
    tmp.set_file_name(file_name);
    tmp
}

/// Read the raw bytes of the persisted file, for backup purposes.
pub fn read_raw(path: &Path) -> Result<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Whole-file replace write of raw bytes, for restore purposes.
pub fn write_raw(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = tmp_path_for(path);
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
