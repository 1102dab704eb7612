//! Local ONNX Runtime sentence encoder.
//!
//! Loads `model.onnx` and `tokenizer.json` from the configured cache
//! directory, runs the encoder, and mean-pools token embeddings under the
//! attention mask. The output dimension is read from the model by embedding a
//! probe sentence at load time.

use std::sync::Mutex;

use anyhow::{Context, Result};
use ndarray::{Array2, ArrayView3, Axis};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;

/// Maximum sequence length fed to the encoder.
const MAX_SEQ_LEN: usize = 256;

pub struct LocalEmbeddingProvider {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    model: String,
    dim: usize,
}

// Safety: Tokenizer is Send+Sync. Session is behind a Mutex.
unsafe impl Send for LocalEmbeddingProvider {}
unsafe impl Sync for LocalEmbeddingProvider {}

impl LocalEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let cache_dir = crate::config::expand_tilde(&config.cache_dir);
        let model_path = cache_dir.join("model.onnx");
        let tokenizer_path = cache_dir.join("tokenizer.json");

        anyhow::ensure!(
            model_path.exists(),
            "ONNX model not found at {}. Run `mindloop model download` first.",
            model_path.display()
        );
        anyhow::ensure!(
            tokenizer_path.exists(),
            "Tokenizer not found at {}. Run `mindloop model download` first.",
            tokenizer_path.display()
        );

        let session = Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&model_path)
            .context("failed to load ONNX model")?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("failed to set truncation: {e}"))?;
        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            strategy: tokenizers::PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        let mut provider = Self {
            session: Mutex::new(session),
            tokenizer,
            model: config.model.clone(),
            dim: 0,
        };
        provider.dim = provider
            .run(&["dimension probe"])?
            .first()
            .map(Vec::len)
            .context("encoder returned no output for the probe sentence")?;

        tracing::info!(
            model = %model_path.display(),
            dim = provider.dim,
            "ONNX sentence encoder loaded"
        );
        Ok(provider)
    }

    fn run(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;

        let batch = encodings.len();
        let seq_len = encodings.first().map(|e| e.get_ids().len()).unwrap_or(0);

        let mut ids = Vec::with_capacity(batch * seq_len);
        let mut mask = Vec::with_capacity(batch * seq_len);
        for encoding in &encodings {
            ids.extend(encoding.get_ids().iter().map(|&id| id as i64));
            mask.extend(encoding.get_attention_mask().iter().map(|&m| m as i64));
        }
        let mask_f32 = Array2::from_shape_vec(
            (batch, seq_len),
            mask.iter().map(|&m| m as f32).collect(),
        )?;

        let shape = vec![batch as i64, seq_len as i64];
        let ids_tensor = Tensor::from_array((shape.clone(), ids.into_boxed_slice()))?;
        let mask_tensor = Tensor::from_array((shape.clone(), mask.into_boxed_slice()))?;
        let type_tensor =
            Tensor::from_array((shape, vec![0i64; batch * seq_len].into_boxed_slice()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("session lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs! {
            "input_ids" => ids_tensor,
            "attention_mask" => mask_tensor,
            "token_type_ids" => type_tensor,
        })?;

        let hidden_value = outputs
            .get("token_embeddings")
            .or_else(|| outputs.get("last_hidden_state"))
            .unwrap_or_else(|| &outputs[0]);
        let (shape, data) = hidden_value
            .try_extract_tensor::<f32>()
            .context("failed to extract token embeddings")?;
        let dims: &[i64] = &shape;
        anyhow::ensure!(
            dims.len() == 3 && dims[0] as usize == batch && dims[1] as usize == seq_len,
            "unexpected token embedding shape {dims:?} for batch {batch} x {seq_len}"
        );
        let hidden = ArrayView3::from_shape((batch, seq_len, dims[2] as usize), data)?;

        Ok(hidden
            .axis_iter(Axis(0))
            .zip(mask_f32.axis_iter(Axis(0)))
            .map(|(tokens, m)| {
                let count = m.sum();
                let mut pooled = tokens.t().dot(&m);
                if count > 0.0 {
                    pooled /= count;
                }
                l2_normalize(pooled.as_slice().unwrap_or(&[]))
            })
            .collect())
    }
}

impl EmbeddingProvider for LocalEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.run(&[text])?
            .into_iter()
            .next()
            .context("encoder returned no output")
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        self.run(texts)
    }

    fn dimensions(&self) -> usize {
        self.dim
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// L2-normalize a vector. Returns the input unchanged if its norm is zero.
fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}
