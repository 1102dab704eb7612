//! CLI `doctor` command: database diagnostics plus index consistency.

use anyhow::{Context, Result};

use mindloop::config::MindloopConfig;
use mindloop::db;
use mindloop::embedding;
use mindloop::index::VectorIndex;
use mindloop::memory::integrity;

/// Run diagnostics and print a health report. Reports only; `reindex` repairs.
pub fn doctor(config: &MindloopConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let index_path = config.resolved_index_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `mindloop run` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);
    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("mindloop Health Report");
    println!("======================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!();
    println!("Embedding profile:");
    match &report.embedding {
        Some(p) => println!("  Stored:          {} ({} dims)", p.model, p.dim),
        None => println!("  Stored:          (not set)"),
    }

    let provider = embedding::create_provider(&config.embedding).ok();
    match &provider {
        Some(p) => {
            println!("  Configured:      {} ({} dims)", p.model_name(), p.dimensions());
            if let Some(stored) = &report.embedding {
                if stored.model != p.model_name() || stored.dim != p.dimensions() {
                    println!("  WARNING: profile mismatch! Run `mindloop reindex` to rebuild vectors.");
                } else {
                    println!("  Status:          OK (match)");
                }
            }
        }
        None => println!("  Configured:      {} (unavailable)", config.embedding.provider),
    }
    println!();
    println!("Row counts:");
    println!("  Cycles:          {}", report.cycle_count);
    println!("  Artifacts:       {}", report.artifact_count);
    println!("  Memories:        {}", report.memory_count);
    println!("  Vector slots:    {}", report.slot_count);
    println!("  Debates:         {}", report.debate_count);
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
    }
    println!(
        "Full-text index:   {}",
        if report.fts_ok { "PASSED" } else { "FAILED" }
    );

    println!();
    println!("Vector index:      {}", index_path.display());
    let expected_dim = provider.as_ref().map(|p| p.dimensions());
    let consistent = if index_path.exists() {
        let index = VectorIndex::open(&index_path, expected_dim).context("failed to load vector index")?;
        let check = integrity::verify(&conn, &index)?;
        println!("  Entries:         {}", check.indexed);
        println!("  Missing:         {}", check.missing_vectors.len());
        println!("  Orphans:         {}", check.orphan_vectors.len());
        println!("  Slot mismatches: {}", check.slot_mismatches.len());
        check.is_consistent()
    } else {
        println!("  (not persisted yet)");
        report.memory_count == 0
    };

    if !report.integrity_ok || !report.fts_ok || !consistent {
        println!();
        println!("Recovery steps:");
        if !report.integrity_ok {
            println!("  - Restore the database from a backup: cp backup.sqlite3 {}", db_path.display());
        }
        if !report.fts_ok || !consistent {
            println!("  - Rebuild derived indexes: mindloop reindex");
        }
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::format_bytes;

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
