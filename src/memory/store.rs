//! Memory write path and lookups.
//!
//! A memory is a `memories` row, a `vector_slots` row, and one vector in the
//! [`VectorIndex`]. [`remember`] and [`forget`] keep the three in step: the
//! vector is added inside the text-store transaction and removed again if that
//! transaction fails to commit.

use std::collections::HashMap;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::types::{MemoryKind, MemoryRecord};
use crate::error::{Error, Result};
use crate::index::VectorIndex;

/// Fields supplied by the caller when storing a memory.
#[derive(Debug, Clone)]
pub struct NewMemory<'a> {
    pub content: &'a str,
    pub kind: MemoryKind,
    pub metadata: Option<&'a serde_json::Value>,
    pub importance: f64,
    pub uncertainty: f64,
    pub provenance: Option<&'a str>,
}

impl<'a> NewMemory<'a> {
    pub fn new(content: &'a str, kind: MemoryKind) -> Self {
        Self {
            content,
            kind,
            metadata: None,
            importance: 0.0,
            uncertainty: 0.0,
            provenance: None,
        }
    }
}

/// Store a memory with its embedding. Returns the new record.
pub fn remember(
    conn: &mut Connection,
    index: &mut VectorIndex,
    memory: &NewMemory<'_>,
    embedding: &[f32],
) -> Result<MemoryRecord> {
    if let Some(meta) = memory.metadata {
        if !meta.is_object() {
            return Err(Error::config("memory metadata must be a JSON object"));
        }
    }
    let id = uuid::Uuid::now_v7().to_string();
    let created_at = chrono::Utc::now().to_rfc3339();
    let metadata = memory
        .metadata
        .cloned()
        .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
    let metadata_json = serde_json::to_string(&metadata)?;

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO memories (id, kind, content, created_at, metadata, importance, uncertainty, provenance) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            memory.kind.as_str(),
            memory.content,
            created_at,
            metadata_json,
            memory.importance,
            memory.uncertainty,
            memory.provenance,
        ],
    )?;

    // Dropping `tx` on error rolls the row back; nothing reached the index yet.
    let slot = index.add(&id, embedding)?;

    let committed = tx
        .execute(
            "INSERT INTO vector_slots (memory_id, slot) VALUES (?1, ?2)",
            params![id, slot],
        )
        .and_then(|_| tx.commit());
    if let Err(e) = committed {
        tracing::warn!(id = %id, error = %e, "text store write failed; removing vector");
        index.remove(&id)?;
        return Err(e.into());
    }

    tracing::debug!(id = %id, kind = %memory.kind, slot, "memory stored");
    Ok(MemoryRecord {
        id,
        content: memory.content.to_string(),
        created_at,
        kind: memory.kind,
        metadata,
        importance: memory.importance,
        uncertainty: memory.uncertainty,
        recall_count: 0,
        provenance: memory.provenance.map(str::to_string),
    })
}

/// Delete a memory and its vector. Returns `false` if the id is unknown.
pub fn forget(conn: &mut Connection, index: &mut VectorIndex, id: &str) -> Result<bool> {
    let tx = conn.transaction()?;
    let deleted = tx.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Ok(false);
    }
    tx.commit()?;

    if !index.remove(id)? {
        tracing::warn!(id, "forgotten memory had no vector");
    }
    tracing::debug!(id, "memory forgotten");
    Ok(true)
}

const SELECT_COLUMNS: &str =
    "id, content, created_at, kind, metadata, importance, uncertainty, recall_count, provenance";

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<MemoryRecord> {
    let kind: String = row.get(3)?;
    let metadata: String = row.get(4)?;
    Ok(MemoryRecord {
        id: row.get(0)?,
        content: row.get(1)?,
        created_at: row.get(2)?,
        kind: kind.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
        })?,
        metadata: serde_json::from_str(&metadata).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?,
        importance: row.get(5)?,
        uncertainty: row.get(6)?,
        recall_count: row.get(7)?,
        provenance: row.get(8)?,
    })
}

pub fn get_memory(conn: &Connection, id: &str) -> Result<Option<MemoryRecord>> {
    Ok(conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM memories WHERE id = ?1"),
            params![id],
            row_to_record,
        )
        .optional()?)
}

/// Look up memories by id. Unknown ids are absent from the map.
pub fn get_memories(conn: &Connection, ids: &[String]) -> Result<HashMap<String, MemoryRecord>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let placeholders = vec!["?"; ids.len()].join(",");
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM memories WHERE id IN ({placeholders})"
    ))?;
    let rows = stmt
        .query_map(params_from_iter(ids.iter()), row_to_record)?
        .map(|r| r.map(|m| (m.id.clone(), m)))
        .collect::<std::result::Result<HashMap<_, _>, _>>()?;
    Ok(rows)
}

/// Every memory, oldest first.
pub fn all_memories(conn: &Connection) -> Result<Vec<MemoryRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM memories ORDER BY created_at, id"
    ))?;
    let rows = stmt
        .query_map([], row_to_record)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Bump `recall_count` for each id.
pub fn increment_recall(conn: &Connection, ids: &[String]) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let placeholders = vec!["?"; ids.len()].join(",");
    conn.execute(
        &format!("UPDATE memories SET recall_count = recall_count + 1 WHERE id IN ({placeholders})"),
        params_from_iter(ids.iter()),
    )?;
    Ok(())
}

/// `(memory_id, slot)` for every recorded vector slot.
pub fn slot_map(conn: &Connection) -> Result<HashMap<String, i64>> {
    let mut stmt = conn.prepare("SELECT memory_id, slot FROM vector_slots")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<std::result::Result<HashMap<_, _>, _>>()?;
    Ok(rows)
}
