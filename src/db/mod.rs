pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;

static SQLITE_VEC_INIT: Once = Once::new();

/// Register the sqlite-vec extension globally. Safe to call multiple times.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Open (or create) the text store at the given path, with schema initialized
/// and migrations applied.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;

    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&mut conn).context("failed to run migrations")?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open a fully migrated in-memory text store.
pub fn open_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&mut conn).context("failed to run migrations")?;
    Ok(conn)
}

/// Result of [`check_database_health`].
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub fts_ok: bool,
    pub schema_version: u32,
    pub embedding: Option<migrations::EmbeddingProfile>,
    pub cycle_count: i64,
    pub artifact_count: i64,
    pub memory_count: i64,
    pub slot_count: i64,
    pub debate_count: i64,
}

/// Run SQLite and FTS5 integrity checks and gather row counts.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let integrity_details: String = conn
        .query_row("PRAGMA integrity_check", [], |row| row.get(0))
        .context("integrity_check failed to run")?;
    let integrity_ok = integrity_details == "ok";

    // FTS5 raises an error from this special insert when the index and the
    // content table disagree.
    let fts_ok = conn
        .execute(
            "INSERT INTO artifacts_fts(artifacts_fts) VALUES('integrity-check')",
            [],
        )
        .is_ok();

    let count = |table: &str| -> Result<i64> {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .with_context(|| format!("failed to count {table}"))
    };

    Ok(HealthReport {
        integrity_ok,
        integrity_details,
        fts_ok,
        schema_version: migrations::get_schema_version(conn)?,
        embedding: migrations::get_embedding_profile(conn)?,
        cycle_count: count("cycles")?,
        artifact_count: count("artifacts")?,
        memory_count: count("memories")?,
        slot_count: count("vector_slots")?,
        debate_count: count("debates")?,
    })
}
