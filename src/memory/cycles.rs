//! Cycle bookkeeping and the debate audit trail.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::Result;

/// Open a new cycle row and return its id.
pub fn begin_cycle(conn: &Connection, seed: i64, config_hash: Option<&str>) -> Result<i64> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO cycles (started_at, seed, config_hash) VALUES (?1, ?2, ?3)",
        params![now, seed, config_hash],
    )?;
    let id = conn.last_insert_rowid();
    tracing::debug!(cycle = id, "cycle started");
    Ok(id)
}

/// Stamp `ended_at` on a cycle. Returns `false` if the cycle does not exist.
pub fn end_cycle(conn: &Connection, cycle_id: i64) -> Result<bool> {
    let now = chrono::Utc::now().to_rfc3339();
    let n = conn.execute(
        "UPDATE cycles SET ended_at = ?1 WHERE id = ?2",
        params![now, cycle_id],
    )?;
    Ok(n > 0)
}

/// Timestamps of one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleRow {
    pub id: i64,
    pub started_at: String,
    pub ended_at: Option<String>,
}

pub fn get_cycle(conn: &Connection, cycle_id: i64) -> Result<Option<CycleRow>> {
    Ok(conn
        .query_row(
            "SELECT id, started_at, ended_at FROM cycles WHERE id = ?1",
            params![cycle_id],
            |row| {
                Ok(CycleRow {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    ended_at: row.get(2)?,
                })
            },
        )
        .optional()?)
}

/// What was debated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    Action,
    Memory,
}

impl CandidateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Memory => "memory",
        }
    }
}

/// One row of the `debates` audit table.
#[derive(Debug, Clone, Serialize)]
pub struct DebateRecord {
    pub cycle_id: Option<i64>,
    pub candidate_kind: CandidateKind,
    pub subject: String,
    pub persona_name: Option<String>,
    pub persona_label: Option<String>,
    pub persona_reason: Option<String>,
    pub persona_risk: Option<f64>,
    pub neutral_label: Option<String>,
    pub neutral_reason: Option<String>,
    pub neutral_risk: Option<f64>,
    pub outcome: String,
    pub expected_value: Option<f64>,
}

/// Append a debate outcome. Returns the row id.
pub fn record_debate(conn: &Connection, record: &DebateRecord) -> Result<i64> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO debates (cycle_id, candidate_kind, subject, persona_name, persona_label, \
         persona_reason, persona_risk, neutral_label, neutral_reason, neutral_risk, outcome, \
         expected_value, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            record.cycle_id,
            record.candidate_kind.as_str(),
            record.subject,
            record.persona_name,
            record.persona_label,
            record.persona_reason,
            record.persona_risk,
            record.neutral_label,
            record.neutral_reason,
            record.neutral_risk,
            record.outcome,
            record.expected_value,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// `(candidate_kind, subject, outcome)` for every debate in a cycle.
pub fn debate_outcomes(conn: &Connection, cycle_id: i64) -> Result<Vec<(String, String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT candidate_kind, subject, outcome FROM debates WHERE cycle_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![cycle_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
