//! Text-to-vector embedding.
//!
//! Provides the [`EmbeddingProvider`] trait plus two implementations: a
//! deterministic feature-hashing embedder ([`hash::HashEmbedder`]) that needs
//! no model files, and a local ONNX Runtime sentence encoder
//! ([`local::LocalEmbeddingProvider`]). Pick one with [`create_provider`].

pub mod hash;
pub mod local;

use std::sync::Arc;

use anyhow::Result;

use crate::config::EmbeddingConfig;
use crate::error::Error;

/// Trait for embedding text into vectors.
///
/// Every vector a provider returns has exactly [`dimensions`](Self::dimensions)
/// components. All methods are synchronous; async callers go through
/// [`crate::bounded::call_blocking`].
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of text strings. Implementations may override for batched inference.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize;

    /// Identifier recorded as the database's embedding profile.
    fn model_name(&self) -> &str;
}

/// Create an embedding provider from config.
///
/// `"hash"` always succeeds. `"local"` fails if the model files are missing;
/// run `mindloop model download` first.
pub fn create_provider(config: &EmbeddingConfig) -> crate::Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "hash" => Ok(Arc::new(hash::HashEmbedder::new(config.dim))),
        "local" => {
            let provider = local::LocalEmbeddingProvider::new(config)
                .map_err(|e| Error::config(format!("{e:#}")))?;
            Ok(Arc::new(provider))
        }
        other => Err(Error::config(format!(
            "unknown embedding provider: {other}. Supported: hash, local"
        ))),
    }
}
