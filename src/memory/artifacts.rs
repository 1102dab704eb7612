//! Artifact text store and keyword search.
//!
//! Every artifact row has a matching `artifacts_fts` row with the same rowid.
//! [`add_artifact`] writes both in one transaction; [`keyword_search`] uses the
//! FTS index only to find candidates and ranks them with [`super::bm25`].

use std::collections::{HashMap, HashSet};

use rusqlite::{params, params_from_iter, Connection};
use serde::Serialize;

use super::bm25::{self, Bm25Params};
use super::types::KeywordHit;
use crate::error::{Error, Result};

/// An artifact row.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub id: i64,
    pub cycle_id: i64,
    pub kind: String,
    pub content: String,
    pub created_at: String,
}

/// Append an artifact and its full-text entry. Returns the new artifact id.
///
/// `cycle_id` must reference an existing cycle.
pub fn add_artifact(
    conn: &mut Connection,
    cycle_id: i64,
    kind: &str,
    content: &str,
    created_at: &str,
) -> Result<i64> {
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO artifacts (cycle_id, kind, content, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![cycle_id, kind, content, created_at],
    )?;
    let id = tx.last_insert_rowid();

    tx.execute(
        "INSERT INTO artifacts_fts (rowid, content) VALUES (?1, ?2)",
        params![id, content],
    )
    .map_err(|e| Error::integrity(format!("full-text insert for artifact {id} failed: {e}")))?;

    tx.commit()?;
    tracing::debug!(id, cycle_id, kind, "artifact stored");
    Ok(id)
}

/// Rebuild the full-text index from the `artifacts` table.
pub fn rebuild_fts(conn: &Connection) -> Result<()> {
    conn.execute("INSERT INTO artifacts_fts(artifacts_fts) VALUES('rebuild')", [])?;
    tracing::info!("artifact full-text index rebuilt");
    Ok(())
}

/// Look up artifact contents by id. Unknown ids are absent from the map.
pub fn get_by_ids(conn: &Connection, ids: &[i64]) -> Result<HashMap<i64, String>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let placeholders = vec!["?"; ids.len()].join(",");
    let mut stmt = conn.prepare(&format!(
        "SELECT id, content FROM artifacts WHERE id IN ({placeholders})"
    ))?;
    let rows = stmt
        .query_map(params_from_iter(ids.iter()), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<HashMap<_, _>, _>>()?;
    Ok(rows)
}

/// All artifacts written during one cycle, in insertion order.
pub fn artifacts_for_cycle(conn: &Connection, cycle_id: i64) -> Result<Vec<Artifact>> {
    let mut stmt = conn.prepare(
        "SELECT id, cycle_id, kind, content, created_at FROM artifacts \
         WHERE cycle_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![cycle_id], |row| {
            Ok(Artifact {
                id: row.get(0)?,
                cycle_id: row.get(1)?,
                kind: row.get(2)?,
                content: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Build an FTS5 query that matches any query token.
///
/// Each token is quoted so FTS5 operators in user text are treated as plain
/// words. Returns `None` when the text has no tokens.
pub fn fts_or_query(text: &str) -> Option<String> {
    let mut seen = HashSet::new();
    let terms: Vec<String> = bm25::tokenize(text)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

/// Candidate artifacts that share at least one token with `text`.
fn fts_candidates(conn: &Connection, text: &str, limit: usize) -> Result<Vec<(i64, String)>> {
    let Some(query) = fts_or_query(text) else {
        return Ok(Vec::new());
    };
    let mut stmt = conn.prepare(
        "SELECT rowid, content FROM artifacts_fts WHERE artifacts_fts MATCH ?1 \
         ORDER BY rowid LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![query, limit as i64], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Keyword search over artifacts, best BM25 score first.
///
/// At most `limit` candidates are considered. Scores are relative to that
/// candidate set.
pub fn keyword_search(conn: &Connection, text: &str, limit: usize) -> Result<Vec<KeywordHit>> {
    keyword_search_with(conn, text, limit, Bm25Params::default())
}

pub fn keyword_search_with(
    conn: &Connection,
    text: &str,
    limit: usize,
    params: Bm25Params,
) -> Result<Vec<KeywordHit>> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let candidates = fts_candidates(conn, text, limit)?;
    let scores = bm25::score(text, &candidates, params);

    let mut hits: Vec<KeywordHit> = candidates
        .into_iter()
        .zip(scores)
        .map(|((id, content), score)| KeywordHit { id, content, score })
        .collect();
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    tracing::debug!(candidates = hits.len(), "keyword search");
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::memory::cycles::begin_cycle;

    fn setup() -> (Connection, i64) {
        let conn = open_in_memory().unwrap();
        let cycle = begin_cycle(&conn, 42, None).unwrap();
        (conn, cycle)
    }

    #[test]
    fn add_artifact_indexes_content() {
        let (mut conn, cycle) = setup();
        let id = add_artifact(&mut conn, cycle, "input", "the heron stands still", "t0").unwrap();

        let fts: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM artifacts_fts WHERE artifacts_fts MATCH 'heron'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(fts, 1);
        assert_eq!(get_by_ids(&conn, &[id]).unwrap()[&id], "the heron stands still");
    }

    #[test]
    fn add_artifact_requires_existing_cycle() {
        let (mut conn, _) = setup();
        assert!(add_artifact(&mut conn, 999, "input", "orphan", "t0").is_err());
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM artifacts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn get_by_ids_empty_and_unknown() {
        let (mut conn, cycle) = setup();
        assert!(get_by_ids(&conn, &[]).unwrap().is_empty());
        let id = add_artifact(&mut conn, cycle, "note", "kept", "t0").unwrap();
        let found = get_by_ids(&conn, &[id, id + 100]).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn fts_query_quotes_and_dedups_tokens() {
        assert_eq!(
            fts_or_query("NEAR(a b) OR a").as_deref(),
            Some("\"near\" OR \"a\" OR \"b\" OR \"or\"")
        );
        assert_eq!(fts_or_query("?!"), None);
    }

    #[test]
    fn keyword_search_ranks_by_bm25() {
        let (mut conn, cycle) = setup();
        add_artifact(&mut conn, cycle, "note", "gate veto risk", "t0").unwrap();
        let best = add_artifact(&mut conn, cycle, "note", "veto veto veto", "t1").unwrap();
        add_artifact(&mut conn, cycle, "note", "unrelated words only", "t2").unwrap();

        let hits = keyword_search(&conn, "veto", 200).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, best);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn keyword_search_without_tokens_is_empty() {
        let (mut conn, cycle) = setup();
        add_artifact(&mut conn, cycle, "note", "anything", "t0").unwrap();
        assert!(keyword_search(&conn, "   ", 200).unwrap().is_empty());
        assert!(keyword_search(&conn, "anything", 0).unwrap().is_empty());
    }

    #[test]
    fn artifacts_for_cycle_in_order() {
        let (mut conn, cycle) = setup();
        add_artifact(&mut conn, cycle, "input", "first", "t0").unwrap();
        add_artifact(&mut conn, cycle, "plan", "second", "t1").unwrap();
        let rows = artifacts_for_cycle(&conn, cycle).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].content, "first");
        assert_eq!(rows[1].kind, "plan");
    }

    #[test]
    fn rebuilt_fts_still_finds_artifacts() {
        let (mut conn, cycle) = setup();
        let id = add_artifact(&mut conn, cycle, "note", "quarterly budget review", "t0").unwrap();
        rebuild_fts(&conn).unwrap();
        let hits = keyword_search(&conn, "budget", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);
    }
}
