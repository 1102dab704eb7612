//! Core record types.
//!
//! Defines [`MemoryKind`], [`MemoryRecord`] (a durable memory backed by one
//! vector), [`KeywordHit`] (a ranked artifact), and [`RecallHit`] (one fused
//! hybrid recall result tagged with its [`Source`]).

use serde::{Deserialize, Serialize};

/// What a memory was distilled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Something seen or received from outside the loop.
    Observation,
    /// A promoted interaction artifact.
    Artifact,
    /// The loop's own conclusion about a cycle.
    Reflection,
    Code,
    Plan,
}

impl MemoryKind {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Observation => "observation",
            Self::Artifact => "artifact",
            Self::Reflection => "reflection",
            Self::Code => "code",
            Self::Plan => "plan",
        }
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "observation" => Ok(Self::Observation),
            "artifact" => Ok(Self::Artifact),
            "reflection" => Ok(Self::Reflection),
            "code" => Ok(Self::Code),
            "plan" => Ok(Self::Plan),
            _ => Err(format!("unknown memory kind: {s}")),
        }
    }
}

/// A memory row, matching the `memories` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// UUID v7, immutable once assigned.
    pub id: String,
    pub content: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    pub kind: MemoryKind,
    /// Arbitrary JSON object.
    pub metadata: serde_json::Value,
    pub importance: f64,
    pub uncertainty: f64,
    /// Times hybrid recall has returned this memory.
    pub recall_count: u32,
    /// Where the memory came from, e.g. `cycle:12`.
    pub provenance: Option<String>,
}

/// An artifact ranked by BM25 against a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordHit {
    pub id: i64,
    pub content: String,
    /// Raw BM25 score, relative to the candidate set it was computed over.
    pub score: f64,
}

/// Which store a recall hit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Memory,
    Artifact,
}

/// One fused hybrid recall result.
#[derive(Debug, Clone, Serialize)]
pub struct RecallHit {
    pub source: Source,
    /// Memory UUID, or the artifact's integer id rendered as text.
    pub id: String,
    pub content: String,
    /// Cosine similarity clamped to `[0, 1]`; 0 for keyword hits.
    pub cosine: f64,
    /// BM25 divided by the best keyword score; 0 for semantic hits.
    pub bm25: f64,
    /// `alpha * cosine` or `(1 - alpha) * bm25`.
    pub score: f64,
}
