//! Forward-only schema migration framework.
//!
//! Tracks the schema version in `schema_meta` and runs sequential migrations
//! to bring the database up to [`CURRENT_SCHEMA_VERSION`]. Also stores the
//! embedding profile (model name and dimension) the vectors were built with.

use rusqlite::{Connection, OptionalExtension};

/// The schema version that the current binary expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Get the current schema version from the database.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}

fn update_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE schema_meta SET value = ?1 WHERE key = 'schema_version'",
        [version.to_string()],
    )?;
    Ok(())
}

/// Model name and vector dimension recorded for this database.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct EmbeddingProfile {
    pub model: String,
    pub dim: usize,
}

/// Get the stored embedding profile, if one was ever recorded.
pub fn get_embedding_profile(conn: &Connection) -> rusqlite::Result<Option<EmbeddingProfile>> {
    let model: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_meta WHERE key = 'embedding_model'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    let dim: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_meta WHERE key = 'embedding_dim'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    Ok(match (model, dim.and_then(|d| d.parse::<usize>().ok())) {
        (Some(model), Some(dim)) => Some(EmbeddingProfile { model, dim }),
        _ => None,
    })
}

/// Record the embedding profile used for the vectors behind this database.
pub fn set_embedding_profile(conn: &Connection, model: &str, dim: usize) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('embedding_model', ?1)",
        [model],
    )?;
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('embedding_dim', ?1)",
        [dim.to_string()],
    )?;
    Ok(())
}

/// Run any pending forward-only migrations. Each migration runs in a transaction.
pub fn run_migrations(conn: &mut Connection) -> rusqlite::Result<()> {
    let mut version = get_schema_version(conn)?;
    tracing::debug!(schema_version = version, target = CURRENT_SCHEMA_VERSION, "checking migrations");

    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        tracing::info!(from = version, to = next, "running migration");

        let tx = conn.transaction()?;
        match next {
            2 => migrate_v1_to_v2(&tx)?,
            _ => {
                tracing::error!(version = next, "unknown migration target");
                break;
            }
        }
        update_schema_version(&tx, next)?;
        tx.commit()?;
        version = next;
    }

    Ok(())
}

/// Migration v1 → v2: audit table for persona/neutral debate outcomes.
fn migrate_v1_to_v2(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS debates (
    id INTEGER PRIMARY KEY,
    cycle_id INTEGER REFERENCES cycles(id),
    candidate_kind TEXT NOT NULL CHECK(candidate_kind IN ('action','memory')),
    subject TEXT NOT NULL,
    persona_name TEXT,
    persona_label TEXT,
    persona_reason TEXT,
    persona_risk REAL,
    neutral_label TEXT,
    neutral_reason TEXT,
    neutral_risk REAL,
    outcome TEXT NOT NULL,
    expected_value REAL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_debates_cycle ON debates(cycle_id);
"#,
    )
}
