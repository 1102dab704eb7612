pub mod debate;
pub mod doctor;
pub mod gate;
pub mod recall;
pub mod reindex;
pub mod run;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use mindloop::config::MindloopConfig;
use mindloop::debate::{DebateEngine, MemoryDebate};
use mindloop::embedding::{self, EmbeddingProvider};
use mindloop::index::VectorIndex;
use mindloop::judge::create_judges;
use mindloop::memory::integrity::{check_embedding_profile, ProfileStatus};
use mindloop::{db, memory};

const MODEL_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/onnx/model.onnx";
const TOKENIZER_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/tokenizer.json";

/// Text store, vector index and embedder, opened from config.
pub struct Stores {
    pub conn: Connection,
    pub index: VectorIndex,
    pub embedder: Arc<dyn EmbeddingProvider>,
}

/// Open both stores and the embedder. The index is loaded at the provider's
/// dimension; a mismatched persisted index is discarded and a warning points
/// at `mindloop reindex`.
pub fn open_stores(config: &MindloopConfig) -> Result<Stores> {
    let embedder =
        embedding::create_provider(&config.embedding).context("failed to create embedding provider")?;
    let conn = db::open_database(config.resolved_db_path()).context("failed to open database")?;
    let index = VectorIndex::open(config.resolved_index_path(), Some(embedder.dimensions()))
        .context("failed to load vector index")?;

    if let ProfileStatus::Mismatch { stored } = check_embedding_profile(&conn, embedder.as_ref())? {
        eprintln!(
            "warning: vectors were built with {} ({} dims) but {} ({} dims) is configured; run `mindloop reindex`",
            stored.model,
            stored.dim,
            embedder.model_name(),
            embedder.dimensions()
        );
    }
    let report = memory::integrity::verify(&conn, &index)?;
    if !report.is_consistent() {
        tracing::warn!(
            missing = report.missing_vectors.len(),
            orphans = report.orphan_vectors.len(),
            mismatched = report.slot_mismatches.len(),
            "vector index out of step with the text store; run `mindloop reindex`"
        );
    }

    Ok(Stores {
        conn,
        index,
        embedder,
    })
}

/// Persona/neutral debate engine from config.
pub fn build_engine(config: &MindloopConfig) -> Result<DebateEngine> {
    let judges = create_judges(&config.judges).context("failed to create judges")?;
    Ok(DebateEngine::new(judges, config.judges.timeout())
        .with_persona(&config.persona.name, &config.persona.system)
        .with_neutral_system(&config.persona.neutral_system))
}

/// Multi-round reviewer: the persona argues for, the neutral judge against.
pub fn build_reviewer(config: &MindloopConfig, rounds: usize) -> Result<MemoryDebate> {
    let judges = create_judges(&config.judges).context("failed to create judges")?;
    Ok(MemoryDebate::new(
        judges.persona,
        judges.neutral,
        rounds,
        config.judges.timeout(),
    )?)
}

/// Download the ONNX embedding model and tokenizer to the cache directory.
pub async fn model_download(config: &mindloop::config::EmbeddingConfig) -> Result<()> {
    let cache_dir = mindloop::config::expand_tilde(&config.cache_dir);
    std::fs::create_dir_all(&cache_dir)
        .with_context(|| format!("failed to create cache dir: {}", cache_dir.display()))?;

    for (url, name) in [(MODEL_URL, "model.onnx"), (TOKENIZER_URL, "tokenizer.json")] {
        let dest = cache_dir.join(name);
        if dest.exists() {
            println!("{name} already exists at {}", dest.display());
            continue;
        }
        println!("Downloading {name}...");
        download_file(url, &dest).await?;
        println!("{name} saved to {}", dest.display());
    }

    println!("Model download complete. Set embedding.provider = \"local\" to use it.");
    Ok(())
}

/// Download a file from a URL with progress bar. Uses atomic write (tmp + rename).
async fn download_file(url: &str, dest: &Path) -> Result<()> {
    let mut response = reqwest::get(url)
        .await
        .with_context(|| format!("HTTP request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "download failed with HTTP {}",
        response.status()
    );

    let pb = match response.content_length() {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")?
                    .progress_chars("##-"),
            );
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    let tmp_path = dest.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;

    while let Some(chunk) = response.chunk().await.context("error reading response")? {
        file.write_all(&chunk)
            .await
            .context("error writing to file")?;
        pb.inc(chunk.len() as u64);
    }

    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, dest)
        .await
        .context("failed to rename temp file")?;

    pb.finish_and_clear();
    Ok(())
}

/// First line of `text`, cut to `max` characters.
pub fn preview(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or("");
    if line.chars().count() > max {
        format!("{}...", line.chars().take(max).collect::<String>())
    } else {
        line.to_string()
    }
}
