//! CLI `gate` command: one memory-admission vote, audited to the debates table.

use anyhow::{Context, Result};

use mindloop::config::MindloopConfig;
use mindloop::db;
use mindloop::judge::Judgment;
use mindloop::memory::cycles;

use super::build_engine;

pub async fn gate(config: &MindloopConfig, candidate: &str) -> Result<()> {
    let conn = db::open_database(config.resolved_db_path()).context("failed to open database")?;
    let engine = build_engine(config)?;

    let admission = engine.admit(candidate, config.safety.veto_risk).await?;
    cycles::record_debate(&conn, &admission.to_record(None, engine.persona_name()))?;

    println!("Outcome: {}", admission.outcome.as_str());
    print_judgment(engine.persona_name(), &admission.persona);
    print_judgment("neutral", &admission.neutral);
    Ok(())
}

fn print_judgment(who: &str, judgment: &Judgment) {
    match judgment.verdict() {
        Some(v) => println!(
            "  {who}: {} (risk {}) {}",
            v.label.as_str(),
            v.risk.map_or("-".to_string(), |r| format!("{r:.2}")),
            v.reason
        ),
        None => println!("  {who}: (unparseable reply)"),
    }
}
