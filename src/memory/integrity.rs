//! Consistency between the text store and the vector index, and the rebuild
//! that restores it.

use rusqlite::{params, Connection};
use serde::Serialize;

use super::store;
use crate::db::migrations::{get_embedding_profile, set_embedding_profile, EmbeddingProfile};
use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::index::VectorIndex;

const REBUILD_BATCH: usize = 32;

/// Differences between `memories`/`vector_slots` and the vector index.
#[derive(Debug, Default, Serialize)]
pub struct IntegrityReport {
    pub memories: usize,
    pub indexed: usize,
    /// Memories with no vector in the index.
    pub missing_vectors: Vec<String>,
    /// Index entries with no memory row.
    pub orphan_vectors: Vec<String>,
    /// Memories whose recorded slot differs from the index's.
    pub slot_mismatches: Vec<String>,
}

impl IntegrityReport {
    pub fn is_consistent(&self) -> bool {
        self.missing_vectors.is_empty()
            && self.orphan_vectors.is_empty()
            && self.slot_mismatches.is_empty()
    }
}

/// Compare the text store with the index without changing either.
pub fn verify(conn: &Connection, index: &VectorIndex) -> Result<IntegrityReport> {
    let memories = store::all_memories(conn)?;
    let slots = store::slot_map(conn)?;
    let indexed = index.ids()?;

    let mut report = IntegrityReport {
        memories: memories.len(),
        indexed: indexed.len(),
        ..Default::default()
    };

    let index_slots: std::collections::HashMap<&str, i64> =
        indexed.iter().map(|(id, slot)| (id.as_str(), *slot)).collect();
    for m in &memories {
        match index_slots.get(m.id.as_str()) {
            None => report.missing_vectors.push(m.id.clone()),
            Some(slot) if slots.get(&m.id) != Some(slot) => {
                report.slot_mismatches.push(m.id.clone())
            }
            Some(_) => {}
        }
    }

    let known: std::collections::HashSet<&str> = memories.iter().map(|m| m.id.as_str()).collect();
    report.orphan_vectors = indexed
        .iter()
        .filter(|(id, _)| !known.contains(id.as_str()))
        .map(|(id, _)| id.clone())
        .collect();

    Ok(report)
}

/// How the configured provider relates to the profile the vectors were built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileStatus {
    /// No profile was stored; the provider's has been recorded.
    Recorded,
    Matches,
    /// Stored vectors came from a different model or dimension.
    Mismatch { stored: EmbeddingProfile },
}

/// Compare the database's embedding profile with `provider`, recording it on
/// first use.
pub fn check_embedding_profile(
    conn: &Connection,
    provider: &dyn EmbeddingProvider,
) -> Result<ProfileStatus> {
    match get_embedding_profile(conn)? {
        None => {
            set_embedding_profile(conn, provider.model_name(), provider.dimensions())?;
            Ok(ProfileStatus::Recorded)
        }
        Some(stored)
            if stored.model == provider.model_name() && stored.dim == provider.dimensions() =>
        {
            Ok(ProfileStatus::Matches)
        }
        Some(stored) => {
            tracing::warn!(
                stored_model = %stored.model,
                stored_dim = stored.dim,
                model = provider.model_name(),
                dim = provider.dimensions(),
                "embedding provider changed; run `mindloop reindex`"
            );
            Ok(ProfileStatus::Mismatch { stored })
        }
    }
}

/// Re-embed every memory and rebuild the index and slot map from scratch.
///
/// Also records the provider's model and dimension as the database's
/// embedding profile. Returns the number of memories indexed.
pub fn rebuild_index(
    conn: &mut Connection,
    index: &mut VectorIndex,
    provider: &dyn EmbeddingProvider,
) -> Result<usize> {
    let memories = store::all_memories(conn)?;
    index.clear()?;

    let mut assigned = Vec::with_capacity(memories.len());
    for batch in memories.chunks(REBUILD_BATCH) {
        let texts: Vec<&str> = batch.iter().map(|m| m.content.as_str()).collect();
        let vectors = provider.embed_batch(&texts).map_err(|e| Error::Backend {
            what: "embedding provider".into(),
            message: format!("{e:#}"),
        })?;
        if vectors.len() != batch.len() {
            return Err(Error::integrity(format!(
                "embedding provider returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            )));
        }
        for (memory, vector) in batch.iter().zip(&vectors) {
            let slot = index.add(&memory.id, vector)?;
            assigned.push((memory.id.clone(), slot));
        }
        tracing::info!(done = assigned.len(), total = memories.len(), "re-embedded batch");
    }

    let tx = conn.transaction()?;
    tx.execute("DELETE FROM vector_slots", [])?;
    {
        let mut stmt = tx.prepare("INSERT INTO vector_slots (memory_id, slot) VALUES (?1, ?2)")?;
        for (id, slot) in &assigned {
            stmt.execute(params![id, slot])?;
        }
    }
    set_embedding_profile(&tx, provider.model_name(), provider.dimensions())?;
    tx.commit()?;

    tracing::info!(count = assigned.len(), model = provider.model_name(), "vector index rebuilt");
    Ok(assigned.len())
}
