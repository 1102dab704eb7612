//! Vector index over L2-normalized embeddings.
//!
//! Vectors live in a sqlite-vec `vec0` table inside an in-memory SQLite
//! database, keyed by an internal slot id. Callers address entries by their own
//! opaque id; the `slots` table maps owner id ↔ slot. Slots are handed out from
//! a counter stored in `index_meta`, so they never repeat, even across
//! [`VectorIndex::persist`] and reload.
//!
//! Nothing is written to disk until `persist()` is called.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::load_sqlite_vec;
use crate::error::{Error, Result};

const META_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS slots (
    slot INTEGER PRIMARY KEY,
    owner_id TEXT NOT NULL UNIQUE
);
"#;

/// Largest `k` a vec0 KNN query accepts.
const MAX_KNN: usize = 4096;

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            embedding.len() * std::mem::size_of::<f32>(),
        )
    }
}

/// Decode a sqlite-vec float blob back into a vector.
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Euclidean distance between unit vectors → cosine similarity.
fn l2_to_cosine(distance: f64) -> f64 {
    1.0 - (distance * distance) / 2.0
}

fn normalized(v: &[f32]) -> Result<Vec<f32>> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if !norm.is_finite() || norm == 0.0 {
        return Err(Error::config(
            "embedding provider produced a zero-norm or non-finite vector",
        ));
    }
    Ok(v.iter().map(|x| x / norm).collect())
}

pub struct VectorIndex {
    conn: Connection,
    path: Option<PathBuf>,
    dim: Option<usize>,
    next_slot: i64,
}

impl VectorIndex {
    /// An empty index with no backing file. `persist()` fails on it.
    pub fn in_memory() -> Result<Self> {
        Self::empty(None)
    }

    /// Load the index persisted at `path`, or start empty if there is none.
    ///
    /// If `expected_dim` is given and the persisted index was built with a
    /// different dimension, the persisted contents are discarded and the index
    /// starts empty.
    pub fn open(path: impl AsRef<Path>, expected_dim: Option<usize>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            tracing::info!(path = %path.display(), "no persisted vector index, starting empty");
            return Self::empty(Some(path));
        }

        let snapshot = Snapshot::read(&path)?;
        if let (Some(stored), Some(expected)) = (snapshot.dim, expected_dim) {
            if stored != expected {
                tracing::warn!(
                    path = %path.display(),
                    stored_dim = stored,
                    expected_dim = expected,
                    discarded = snapshot.entries.len(),
                    "persisted vector index has the wrong dimension; recreating it empty"
                );
                let mut index = Self::empty(Some(path))?;
                index.next_slot = snapshot.next_slot;
                index.write_meta("next_slot", &index.next_slot.to_string())?;
                return Ok(index);
            }
        }

        let mut index = Self::empty(Some(path))?;
        index.restore(snapshot)?;
        tracing::info!(
            entries = index.len()?,
            dim = ?index.dim,
            "vector index loaded"
        );
        Ok(index)
    }

    fn empty(path: Option<PathBuf>) -> Result<Self> {
        load_sqlite_vec();
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(META_SQL)?;
        let index = Self {
            conn,
            path,
            dim: None,
            next_slot: 0,
        };
        index.write_meta("next_slot", "0")?;
        Ok(index)
    }

    fn restore(&mut self, snapshot: Snapshot) -> Result<()> {
        self.next_slot = snapshot.next_slot;
        self.write_meta("next_slot", &self.next_slot.to_string())?;
        if let Some(dim) = snapshot.dim {
            self.create_vector_table(dim)?;
        }
        let tx = self.conn.transaction()?;
        {
            let mut slot_stmt = tx.prepare("INSERT INTO slots (slot, owner_id) VALUES (?1, ?2)")?;
            let mut vec_stmt =
                tx.prepare("INSERT INTO vectors (rowid, embedding) VALUES (?1, ?2)")?;
            for (slot, owner_id, vector) in &snapshot.entries {
                slot_stmt.execute(params![slot, owner_id])?;
                vec_stmt.execute(params![slot, embedding_to_bytes(vector)])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn write_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO index_meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn create_vector_table(&mut self, dim: usize) -> Result<()> {
        self.conn.execute_batch(&format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS vectors USING vec0(embedding float[{dim}]);"
        ))?;
        self.write_meta("dim", &dim.to_string())?;
        self.dim = Some(dim);
        Ok(())
    }

    /// Fixed dimension of this index, once known.
    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM slots", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Slot currently assigned to `id`.
    pub fn slot_of(&self, id: &str) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT slot FROM slots WHERE owner_id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// All `(owner_id, slot)` pairs, ordered by slot.
    pub fn ids(&self) -> Result<Vec<(String, i64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT owner_id, slot FROM slots ORDER BY slot")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Insert `vector` under `id` and return the slot it was stored in.
    ///
    /// The first insertion fixes the dimension. An id that is already present
    /// has its old vector replaced and receives a fresh slot.
    pub fn add(&mut self, id: &str, vector: &[f32]) -> Result<i64> {
        if vector.is_empty() {
            return Err(Error::config("cannot index an empty vector"));
        }
        if let Some(dim) = self.dim {
            if dim != vector.len() {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    actual: vector.len(),
                });
            }
        }
        // A rejected vector must not fix the dimension.
        let unit = normalized(vector)?;
        if self.dim.is_none() {
            tracing::info!(dim = vector.len(), "vector index dimension fixed");
            self.create_vector_table(vector.len())?;
        }

        let previous = self.slot_of(id)?;
        let slot = self.next_slot;
        let tx = self.conn.transaction()?;
        if let Some(old) = previous {
            tracing::debug!(id, old_slot = old, "replacing existing vector");
            tx.execute("DELETE FROM vectors WHERE rowid = ?1", params![old])?;
            tx.execute("DELETE FROM slots WHERE slot = ?1", params![old])?;
        }
        tx.execute(
            "INSERT INTO slots (slot, owner_id) VALUES (?1, ?2)",
            params![slot, id],
        )?;
        tx.execute(
            "INSERT INTO vectors (rowid, embedding) VALUES (?1, ?2)",
            params![slot, embedding_to_bytes(&unit)],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO index_meta (key, value) VALUES ('next_slot', ?1)",
            params![(slot + 1).to_string()],
        )?;
        tx.commit()?;
        self.next_slot = slot + 1;

        Ok(slot)
    }

    /// Remove the vector owned by `id`. Returns `false` if there was none.
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        let Some(slot) = self.slot_of(id)? else {
            return Ok(false);
        };
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM vectors WHERE rowid = ?1", params![slot])?;
        tx.execute("DELETE FROM slots WHERE slot = ?1", params![slot])?;
        tx.commit()?;
        Ok(true)
    }

    /// Drop every vector. The dimension is released; the slot counter is kept.
    pub fn clear(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "DROP TABLE IF EXISTS vectors; DELETE FROM slots; DELETE FROM index_meta WHERE key = 'dim';",
        )?;
        self.dim = None;
        Ok(())
    }

    /// The `k` nearest entries to `query` as `(owner_id, cosine)`, best first.
    ///
    /// Asking for more than the index holds returns everything it holds.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(String, f64)>> {
        let Some(dim) = self.dim else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != dim {
            return Err(Error::DimensionMismatch {
                expected: dim,
                actual: query.len(),
            });
        }
        let unit = normalized(query)?;
        let k = k.min(self.len()?).min(MAX_KNN);
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            "WITH knn AS ( \
                 SELECT rowid, distance FROM vectors WHERE embedding MATCH ?1 AND k = ?2 \
             ) \
             SELECT slots.owner_id, knn.distance FROM knn \
             JOIN slots ON slots.slot = knn.rowid \
             ORDER BY knn.distance, knn.rowid",
        )?;
        let hits = stmt
            .query_map(params![embedding_to_bytes(&unit), k as i64], |row| {
                Ok((row.get::<_, String>(0)?, l2_to_cosine(row.get::<_, f64>(1)?)))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(hits)
    }

    /// Write the whole index to its backing file (atomic: temp file + rename).
    pub fn persist(&self) -> Result<()> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| Error::config("vector index has no persistence path"))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("tmp");
        if tmp.exists() {
            std::fs::remove_file(&tmp)?;
        }
        let tmp_str = tmp
            .to_str()
            .ok_or_else(|| Error::config(format!("non-UTF-8 index path: {}", tmp.display())))?;
        self.conn.execute("VACUUM INTO ?1", params![tmp_str])?;
        std::fs::rename(&tmp, path)?;

        tracing::debug!(path = %path.display(), entries = self.len()?, "vector index persisted");
        Ok(())
    }
}

/// Contents of a persisted index file.
struct Snapshot {
    dim: Option<usize>,
    next_slot: i64,
    entries: Vec<(i64, String, Vec<f32>)>,
}

impl Snapshot {
    fn read(path: &Path) -> Result<Self> {
        load_sqlite_vec();
        let conn = Connection::open_with_flags(path, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY)?;

        let meta = |key: &str| -> Result<Option<String>> {
            Ok(conn
                .query_row(
                    "SELECT value FROM index_meta WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?)
        };
        let dim = meta("dim")?.and_then(|d| d.parse::<usize>().ok());
        let next_slot = meta("next_slot")?
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0);

        let entries = if dim.is_some() {
            let mut stmt = conn.prepare(
                "SELECT slots.slot, slots.owner_id, vectors.embedding \
                 FROM slots JOIN vectors ON vectors.rowid = slots.slot \
                 ORDER BY slots.slot",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    let blob: Vec<u8> = row.get(2)?;
                    Ok((row.get(0)?, row.get(1)?, bytes_to_embedding(&blob)))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        } else {
            Vec::new()
        };

        Ok(Self {
            dim,
            next_slot,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(dim: usize, i: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; dim];
        v[i] = 1.0;
        v
    }

    #[test]
    fn self_similarity_is_one() {
        let mut index = VectorIndex::in_memory().unwrap();
        index.add("a", &axis(8, 0)).unwrap();
        index.add("b", &axis(8, 3)).unwrap();

        let hits = index.search(&axis(8, 0), 2).unwrap();
        assert_eq!(hits[0].0, "a");
        assert!((hits[0].1 - 1.0).abs() < 1e-5);
        assert_eq!(hits[1].0, "b");
        assert!(hits[1].1.abs() < 1e-5);
    }

    #[test]
    fn vectors_are_normalized_on_insert() {
        let mut index = VectorIndex::in_memory().unwrap();
        index.add("scaled", &[3.0, 4.0, 0.0]).unwrap();
        let hits = index.search(&[0.6, 0.8, 0.0], 1).unwrap();
        assert!((hits[0].1 - 1.0).abs() < 1e-5);
    }

    #[test]
    fn opposite_vectors_score_minus_one() {
        let mut index = VectorIndex::in_memory().unwrap();
        index.add("up", &[1.0, 0.0]).unwrap();
        let hits = index.search(&[-1.0, 0.0], 1).unwrap();
        assert!((hits[0].1 + 1.0).abs() < 1e-5);
    }

    #[test]
    fn search_returns_at_most_k() {
        let mut index = VectorIndex::in_memory().unwrap();
        for i in 0..5 {
            index.add(&format!("m{i}"), &axis(8, i)).unwrap();
        }
        assert_eq!(index.search(&axis(8, 0), 3).unwrap().len(), 3);
        assert_eq!(index.search(&axis(8, 0), 50).unwrap().len(), 5);
        assert!(index.search(&axis(8, 0), 0).unwrap().is_empty());
    }

    #[test]
    fn empty_index_search_is_empty() {
        let index = VectorIndex::in_memory().unwrap();
        assert!(index.search(&[1.0, 0.0], 4).unwrap().is_empty());
        assert_eq!(index.dim(), None);
    }

    #[test]
    fn dimension_mismatch_is_fatal() {
        let mut index = VectorIndex::in_memory().unwrap();
        index.add("a", &axis(4, 0)).unwrap();
        let err = index.add("b", &axis(5, 0)).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 4,
                actual: 5
            }
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn zero_vector_is_rejected() {
        let mut index = VectorIndex::in_memory().unwrap();
        assert!(index.add("z", &[0.0, 0.0]).is_err());
    }

    #[test]
    fn rejected_first_vector_leaves_dimension_open() {
        let mut index = VectorIndex::in_memory().unwrap();
        assert!(matches!(index.add("z", &[0.0; 4]), Err(Error::Config(_))));
        assert!(index.add("nan", &[f32::NAN, 1.0]).is_err());
        assert_eq!(index.dim(), None);
        assert!(index.is_empty().unwrap());

        index.add("a", &axis(8, 2)).unwrap();
        assert_eq!(index.dim(), Some(8));
    }

    #[test]
    fn rejected_replacement_keeps_old_vector() {
        let mut index = VectorIndex::in_memory().unwrap();
        let slot = index.add("a", &axis(4, 0)).unwrap();
        assert!(index.add("a", &[0.0; 4]).is_err());
        assert_eq!(index.slot_of("a").unwrap(), Some(slot));
        assert_eq!(index.search(&axis(4, 0), 1).unwrap()[0].0, "a");
    }

    #[test]
    fn oversized_k_returns_everything() {
        let mut index = VectorIndex::in_memory().unwrap();
        for i in 0..3 {
            index.add(&format!("m{i}"), &axis(4, i)).unwrap();
        }
        assert_eq!(index.search(&axis(4, 0), 6000).unwrap().len(), 3);
        assert_eq!(index.search(&axis(4, 0), usize::MAX).unwrap().len(), 3);

        index.clear().unwrap();
        index.add("only", &axis(4, 1)).unwrap();
        index.remove("only").unwrap();
        assert!(index.search(&axis(4, 1), 10).unwrap().is_empty());
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut index = VectorIndex::in_memory().unwrap();
        assert!(!index.remove("ghost").unwrap());
        index.add("a", &axis(4, 1)).unwrap();
        assert!(index.remove("a").unwrap());
        assert!(index.search(&axis(4, 1), 1).unwrap().is_empty());
        assert!(!index.remove("a").unwrap());
    }

    #[test]
    fn slots_are_monotonic_and_not_reused() {
        let mut index = VectorIndex::in_memory().unwrap();
        let s0 = index.add("a", &axis(4, 0)).unwrap();
        let s1 = index.add("b", &axis(4, 1)).unwrap();
        index.remove("b").unwrap();
        let s2 = index.add("c", &axis(4, 2)).unwrap();
        assert_eq!((s0, s1, s2), (0, 1, 2));
        assert_eq!(index.slot_of("c").unwrap(), Some(2));
    }

    #[test]
    fn re_adding_an_id_replaces_its_vector() {
        let mut index = VectorIndex::in_memory().unwrap();
        index.add("a", &axis(4, 0)).unwrap();
        index.add("a", &axis(4, 1)).unwrap();
        assert_eq!(index.len().unwrap(), 1);
        let hits = index.search(&axis(4, 1), 1).unwrap();
        assert_eq!(hits[0].0, "a");
        assert!((hits[0].1 - 1.0).abs() < 1e-5);
    }

    #[test]
    fn persist_without_path_is_config_error() {
        let index = VectorIndex::in_memory().unwrap();
        assert!(matches!(index.persist(), Err(Error::Config(_))));
    }

    #[test]
    fn clear_releases_dimension() {
        let mut index = VectorIndex::in_memory().unwrap();
        index.add("a", &axis(4, 0)).unwrap();
        index.clear().unwrap();
        assert_eq!(index.dim(), None);
        assert!(index.is_empty().unwrap());
        let slot = index.add("b", &axis(6, 0)).unwrap();
        assert_eq!(slot, 1);
        assert_eq!(index.dim(), Some(6));
    }

    #[test]
    fn byte_conversion_round_trips() {
        let v = vec![0.25f32, -1.5, 3.0];
        assert_eq!(bytes_to_embedding(embedding_to_bytes(&v)), v);
    }
}
