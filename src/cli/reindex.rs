//! CLI `reindex` command: regenerate every memory vector with the configured
//! provider and rewrite the slot map.

use anyhow::{Context, Result};

use mindloop::config::MindloopConfig;
use mindloop::memory::{artifacts, integrity};

use super::{open_stores, Stores};

pub async fn reindex(config: &MindloopConfig) -> Result<()> {
    let Stores {
        mut conn,
        mut index,
        embedder,
    } = open_stores(config)?;

    println!(
        "Re-embedding memories with '{}' ({} dims)...",
        embedder.model_name(),
        embedder.dimensions()
    );

    let (count, index) = tokio::task::spawn_blocking(move || {
        artifacts::rebuild_fts(&conn)?;
        let count = integrity::rebuild_index(&mut conn, &mut index, embedder.as_ref())?;
        Ok::<_, mindloop::Error>((count, index))
    })
    .await
    .context("reindex worker aborted")??;

    index.persist().context("failed to persist vector index")?;
    println!(
        "Re-embedded {count} memories; index written to {}.",
        config.resolved_index_path().display()
    );
    Ok(())
}
