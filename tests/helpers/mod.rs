#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use mindloop::cycle::{LoopSettings, MindLoop};
use mindloop::db;
use mindloop::debate::{DebateEngine, MemoryDebate};
use mindloop::embedding::hash::HashEmbedder;
use mindloop::index::VectorIndex;
use mindloop::judge::stub::ScriptedJudge;
use mindloop::judge::{Judge, JudgePair};
use mindloop::memory::store::{remember, NewMemory};
use mindloop::memory::MemoryKind;
use rusqlite::Connection;

pub const DIM: usize = 8;
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_in_memory().unwrap()
}

/// Unit vector along axis `i`.
pub fn axis(i: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    v[i % DIM] = 1.0;
    v
}

/// Unit vector whose cosine with `axis(0)` is `cos`.
pub fn at_cosine(cos: f32) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    v[0] = cos;
    v[1] = (1.0 - cos * cos).sqrt();
    v
}

/// Store a memory with an explicit vector. Returns the memory ID.
pub fn insert_memory(
    conn: &mut Connection,
    index: &mut VectorIndex,
    content: &str,
    embedding: &[f32],
) -> String {
    remember(conn, index, &NewMemory::new(content, MemoryKind::Observation), embedding)
        .unwrap()
        .id
}

pub fn scripted(name: &str, replies: &[&str]) -> Arc<ScriptedJudge> {
    Arc::new(ScriptedJudge::new(name, replies.iter().copied()))
}

pub fn engine(persona: Arc<ScriptedJudge>, neutral: Arc<ScriptedJudge>) -> DebateEngine {
    let persona: Arc<dyn Judge> = persona;
    let neutral: Arc<dyn Judge> = neutral;
    DebateEngine::new(JudgePair { persona, neutral }, TIMEOUT)
        .with_persona("Analytical", "You are Analytical.")
}

pub fn reviewer(permissive: &[&str], critical: &[&str], rounds: usize) -> MemoryDebate {
    MemoryDebate::new(
        scripted("permissive", permissive),
        scripted("critical", critical),
        rounds,
        TIMEOUT,
    )
    .unwrap()
}

/// A loop over in-memory stores with the hash embedder.
pub fn mind(engine: DebateEngine, reviewer: MemoryDebate) -> MindLoop {
    MindLoop::new(
        test_db(),
        VectorIndex::in_memory().unwrap(),
        Arc::new(HashEmbedder::new(32)),
        engine,
        reviewer,
        LoopSettings {
            embed_timeout: TIMEOUT,
            ..LoopSettings::default()
        },
    )
}
