//! Deterministic feature-hashing embedder.
//!
//! Each token is hashed with 64-bit FNV-1a into a bucket and a sign; the
//! resulting count vector is L2-normalized. Texts that share tokens land close
//! together, which is enough for tests and offline runs.

use anyhow::Result;

use super::EmbeddingProvider;
use crate::memory::bm25::tokenize;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

pub(crate) fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |h, b| (h ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
}

pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut features = tokenize(text);
        if features.is_empty() {
            // Punctuation-only or empty text still gets a non-zero vector.
            features.push(text.trim().to_string());
        }

        let mut v = vec![0.0f32; self.dim];
        for feature in &features {
            let h = fnv1a(feature.as_bytes());
            let bucket = (h % self.dim as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            // Opposite-signed collisions cancelled out.
            v[(fnv1a(text.as_bytes()) % self.dim as u64) as usize] = 1.0;
            return Ok(v);
        }
        Ok(v.into_iter().map(|x| x / norm).collect())
    }

    fn dimensions(&self) -> usize {
        self.dim
    }

    fn model_name(&self) -> &str {
        "hash-fnv"
    }
}
