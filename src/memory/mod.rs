//! Text store and hybrid recall.
//!
//! Artifacts are raw interaction text searchable by keyword only. Memories are
//! durable records that each own one vector in the [`crate::index::VectorIndex`].
//! [`recall::recall`] fuses both.

pub mod artifacts;
pub mod bm25;
pub mod cycles;
pub mod integrity;
pub mod recall;
pub mod store;
pub mod types;

pub use recall::{recall, RecallParams};
pub use types::{KeywordHit, MemoryKind, MemoryRecord, RecallHit, Source};
