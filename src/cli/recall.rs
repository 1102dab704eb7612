use anyhow::{Context, Result};
use std::sync::Arc;

use mindloop::bounded::call_blocking;
use mindloop::config::MindloopConfig;
use mindloop::memory::{self, RecallParams, Source};

use super::{open_stores, preview};

/// Run a hybrid recall from the terminal.
pub async fn recall(
    config: &MindloopConfig,
    query: &str,
    k: Option<usize>,
    alpha: Option<f64>,
) -> Result<()> {
    let stores = open_stores(config)?;

    let embedder = Arc::clone(&stores.embedder);
    let text = query.to_string();
    let vector = call_blocking("embedding provider", config.embedding.timeout(), move || {
        embedder.embed(&text)
    })
    .await
    .context("failed to embed query")?;

    let params = RecallParams {
        k: k.unwrap_or(config.memory.recall_k),
        alpha: alpha.unwrap_or(config.memory.alpha),
        keyword_ceiling: config.memory.keyword_ceiling,
    };
    let hits = memory::recall(&stores.conn, &stores.index, query, &vector, params)?;

    if hits.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s)\n", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        let source = match hit.source {
            Source::Memory => "memory",
            Source::Artifact => "artifact",
        };
        println!(
            "  {}. [{source}] {} (score: {:.4}, cosine: {:.3}, bm25: {:.3})",
            i + 1,
            hit.id,
            hit.score,
            hit.cosine,
            hit.bm25,
        );
        println!("     {}", preview(&hit.content, 120));
        println!();
    }

    Ok(())
}
