//! Cognitive loop with hybrid memory recall and multi-agent debate gating.
//!
//! mindloop plans, critiques, evaluates and selectively remembers its own
//! interactions. Two subsystems carry the weight:
//!
//! | Subsystem | What it does |
//! |-----------|--------------|
//! | **Hybrid recall** | Fuses cosine similarity over memory vectors with BM25 over artifact text |
//! | **Debate gating** | Persona and neutral judges vote; the neutral judge holds a risk veto |
//!
//! # Architecture
//!
//! - **Storage**: SQLite with FTS5 for artifacts, memories and the id-to-slot map
//! - **Vector index**: [sqlite-vec](https://github.com/asg017/sqlite-vec) in an
//!   in-memory database, persisted explicitly to a single file
//! - **Embeddings**: deterministic feature hashing, or local ONNX Runtime with all-MiniLM-L6-v2
//! - **Judges**: any completion backend behind the [`judge::Judge`] trait
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite database initialization, schema, migrations, and health checks
//! - [`index`]: Vector index keyed by caller ids over internal slots
//! - [`memory`]: Text store, BM25 keyword search, memory records, and hybrid recall
//! - [`embedding`]: Text-to-vector embedding providers
//! - [`judge`]: Completion backends and structured verdict parsing
//! - [`debate`]: Action selection, memory admission, and multi-round memory debate
//! - [`cycle`]: The loop sequencer that drives all of the above

pub mod bounded;
pub mod config;
pub mod cycle;
pub mod db;
pub mod debate;
pub mod embedding;
pub mod error;
pub mod index;
pub mod judge;
pub mod memory;

pub use error::{Error, Result};
