//! CLI `run` command: drive cognitive cycles over inputs.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use mindloop::config::MindloopConfig;
use mindloop::cycle::{CycleReport, MindLoop};

use super::{build_engine, build_reviewer, open_stores, preview, Stores};

/// Run one cycle per input. With no `--input` arguments, inputs are read from
/// stdin, one per non-empty line.
pub async fn run(
    config: &MindloopConfig,
    inputs: Vec<String>,
    cycles: Option<usize>,
    json: bool,
) -> Result<()> {
    let limit = cycles.unwrap_or(config.runtime.cycles);
    let Stores {
        conn,
        index,
        embedder,
    } = open_stores(config)?;
    let engine = build_engine(config)?;
    let reviewer = build_reviewer(config, config.debate.rounds)?;
    let mut mind = MindLoop::new(conn, index, embedder, engine, reviewer, config.loop_settings());

    let inputs = if inputs.is_empty() {
        read_stdin_lines(limit).await?
    } else {
        inputs.into_iter().take(limit).collect()
    };
    if inputs.is_empty() {
        println!("No input given. Pass --input or pipe lines on stdin.");
        return Ok(());
    }

    for input in &inputs {
        let report = mind
            .run_cycle(input)
            .await
            .with_context(|| format!("cycle failed for input: {}", preview(input, 60)))?;
        if json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            print_report(&report);
        }
    }

    let curation = mind.finish().await.context("final curation failed")?;
    if json {
        println!("{}", serde_json::to_string(&curation)?);
    } else {
        println!(
            "Curation: {} reviewed, {} kept, {} forgotten, {} need review",
            curation.reviewed,
            curation.validated.len(),
            curation.forgotten.len(),
            curation.needs_review.len()
        );
    }
    Ok(())
}

async fn read_stdin_lines(limit: usize) -> Result<Vec<String>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut out = Vec::new();
    while out.len() < limit {
        let Some(line) = lines.next_line().await.context("failed to read stdin")? else {
            break;
        };
        let line = line.trim();
        if !line.is_empty() {
            out.push(line.to_string());
        }
    }
    Ok(out)
}

fn print_report(report: &CycleReport) {
    println!("Cycle {}", report.cycle_id);
    println!("  Recalled:   {}", report.recalled.len());
    println!("  Plan:       {}", preview(&report.plan, 100));
    println!("  Critique:   {}", preview(&report.critique, 100));
    for d in &report.decisions {
        match d.expected_value {
            Some(ev) => println!("  [{}] {} (ev {ev:.3})", d.outcome.as_str(), d.action),
            None => println!("  [{}] {}", d.outcome.as_str(), d.action),
        }
    }
    println!("  Chosen:     {}", report.chosen.as_deref().unwrap_or("(none)"));
    println!("  Memory:     {}", report.admission.outcome.as_str());
    if let Some(id) = &report.memory_id {
        println!("  Stored as:  {id}");
    }
    println!();
}
