//! SQL DDL for the text store.
//!
//! Defines `cycles`, `artifacts`, `artifacts_fts` (FTS5, external content),
//! `memories`, `vector_slots` (memory id → vector index slot) and
//! `schema_meta`. The `debates` audit table arrives with migration v2. All DDL
//! uses `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

const SCHEMA_SQL: &str = r#"
-- One row per loop iteration
CREATE TABLE IF NOT EXISTS cycles (
    id INTEGER PRIMARY KEY,
    started_at TEXT NOT NULL,
    ended_at TEXT,
    seed INTEGER,
    config_hash TEXT
);

-- Raw interaction text, keyword-indexed only
CREATE TABLE IF NOT EXISTS artifacts (
    id INTEGER PRIMARY KEY,
    cycle_id INTEGER NOT NULL REFERENCES cycles(id),
    kind TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_artifacts_cycle ON artifacts(cycle_id);

-- Full-text candidate filter for BM25 ranking
CREATE VIRTUAL TABLE IF NOT EXISTS artifacts_fts USING fts5(
    content,
    content='artifacts',
    content_rowid='id'
);

-- Durable memories; each owns exactly one vector
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL CHECK(kind IN ('observation','artifact','reflection','code','plan')),
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    importance REAL NOT NULL DEFAULT 0.0,
    uncertainty REAL NOT NULL DEFAULT 0.0,
    recall_count INTEGER NOT NULL DEFAULT 0,
    provenance TEXT
);

CREATE INDEX IF NOT EXISTS idx_memories_kind ON memories(kind);

-- Memory id → vector index slot
CREATE TABLE IF NOT EXISTS vector_slots (
    memory_id TEXT PRIMARY KEY REFERENCES memories(id) ON DELETE CASCADE,
    slot INTEGER NOT NULL UNIQUE
);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
