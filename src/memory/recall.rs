//! Hybrid recall: vector similarity over memories fused with BM25 over
//! artifacts.
//!
//! Semantic hits score `alpha * cosine`, keyword hits score
//! `(1 - alpha) * bm25 / max_bm25`. The two lists are concatenated, stably
//! sorted by score, and truncated to `k`. A memory and an artifact never merge
//! into one hit even when their text is identical.

use rusqlite::Connection;

use super::artifacts;
use super::store;
use super::types::{RecallHit, Source};
use crate::error::{Error, Result};
use crate::index::VectorIndex;

#[derive(Debug, Clone, Copy)]
pub struct RecallParams {
    pub k: usize,
    /// Weight of semantic similarity, in `[0, 1]`.
    pub alpha: f64,
    /// Maximum keyword candidates fetched from the full-text index.
    pub keyword_ceiling: usize,
}

impl Default for RecallParams {
    fn default() -> Self {
        Self {
            k: 8,
            alpha: 0.7,
            keyword_ceiling: 200,
        }
    }
}

/// Recall up to `params.k` items relevant to `query_text` / `query_vector`.
///
/// Every memory returned has its `recall_count` incremented. A vector whose
/// memory row is missing is an integrity error.
pub fn recall(
    conn: &Connection,
    index: &VectorIndex,
    query_text: &str,
    query_vector: &[f32],
    params: RecallParams,
) -> Result<Vec<RecallHit>> {
    if !(0.0..=1.0).contains(&params.alpha) {
        return Err(Error::config(format!(
            "recall alpha must be in [0, 1], got {}",
            params.alpha
        )));
    }
    let k = params.k;
    if k == 0 {
        return Ok(Vec::new());
    }

    // Oversample so keyword hits can still displace weak semantic ones.
    let semantic = index.search(query_vector, k.saturating_mul(3).max(k))?;
    let ids: Vec<String> = semantic.iter().map(|(id, _)| id.clone()).collect();
    let records = store::get_memories(conn, &ids)?;

    let mut hits = Vec::with_capacity(semantic.len());
    for (id, cosine) in semantic {
        let record = records.get(&id).ok_or_else(|| {
            Error::integrity(format!("vector index holds {id} but no memory row exists"))
        })?;
        let cosine = cosine.clamp(0.0, 1.0);
        hits.push(RecallHit {
            source: Source::Memory,
            id,
            content: record.content.clone(),
            cosine,
            bm25: 0.0,
            score: params.alpha * cosine,
        });
    }

    let keyword = artifacts::keyword_search(conn, query_text, params.keyword_ceiling)?;
    let max_bm25 = keyword.iter().map(|h| h.score).fold(0.0f64, f64::max);
    let divisor = if max_bm25 > 0.0 { max_bm25 } else { 1.0 };
    hits.extend(keyword.into_iter().map(|h| {
        let bm25 = h.score / divisor;
        RecallHit {
            source: Source::Artifact,
            id: h.id.to_string(),
            content: h.content,
            cosine: 0.0,
            bm25,
            score: (1.0 - params.alpha) * bm25,
        }
    }));

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(k);

    let recalled: Vec<String> = hits
        .iter()
        .filter(|h| h.source == Source::Memory)
        .map(|h| h.id.clone())
        .collect();
    store::increment_recall(conn, &recalled)?;

    tracing::debug!(
        returned = hits.len(),
        memories = recalled.len(),
        alpha = params.alpha,
        "hybrid recall"
    );
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::memory::artifacts::add_artifact;
    use crate::memory::cycles::begin_cycle;
    use crate::memory::store::{get_memory, remember, NewMemory};
    use crate::memory::types::MemoryKind;

    fn params(k: usize, alpha: f64) -> RecallParams {
        RecallParams {
            k,
            alpha,
            ..RecallParams::default()
        }
    }

    #[test]
    fn alpha_out_of_range_is_config_error() {
        let conn = open_in_memory().unwrap();
        let index = VectorIndex::in_memory().unwrap();
        for alpha in [-0.1, 1.5, f64::NAN] {
            assert!(matches!(
                recall(&conn, &index, "q", &[1.0], params(3, alpha)),
                Err(Error::Config(_))
            ));
        }
    }

    #[test]
    fn zero_k_returns_nothing() {
        let conn = open_in_memory().unwrap();
        let index = VectorIndex::in_memory().unwrap();
        assert!(recall(&conn, &index, "q", &[1.0], params(0, 0.5))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn memory_and_artifact_with_same_text_stay_separate() {
        let mut conn = open_in_memory().unwrap();
        let mut index = VectorIndex::in_memory().unwrap();
        let cycle = begin_cycle(&conn, 0, None).unwrap();
        add_artifact(&mut conn, cycle, "note", "shared words", "t0").unwrap();
        let m = remember(
            &mut conn,
            &mut index,
            &NewMemory::new("shared words", MemoryKind::Artifact),
            &[1.0, 0.0],
        )
        .unwrap();

        let hits = recall(&conn, &index, "shared words", &[1.0, 0.0], params(5, 0.5)).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().any(|h| h.source == Source::Memory && h.id == m.id));
        assert!(hits.iter().any(|h| h.source == Source::Artifact));
        assert_eq!(get_memory(&conn, &m.id).unwrap().unwrap().recall_count, 1);
    }

    #[test]
    fn orphan_vector_is_integrity_error() {
        let conn = open_in_memory().unwrap();
        let mut index = VectorIndex::in_memory().unwrap();
        index.add("ghost", &[1.0, 0.0]).unwrap();
        assert!(matches!(
            recall(&conn, &index, "", &[1.0, 0.0], params(3, 0.5)),
            Err(Error::Integrity(_))
        ));
    }

    #[test]
    fn negative_cosine_clamps_to_zero() {
        let mut conn = open_in_memory().unwrap();
        let mut index = VectorIndex::in_memory().unwrap();
        remember(
            &mut conn,
            &mut index,
            &NewMemory::new("opposite", MemoryKind::Plan),
            &[-1.0, 0.0],
        )
        .unwrap();
        let hits = recall(&conn, &index, "", &[1.0, 0.0], params(1, 1.0)).unwrap();
        assert_eq!(hits[0].cosine, 0.0);
        assert_eq!(hits[0].score, 0.0);
    }
}
