use anyhow::Result;

use mindloop::config::MindloopConfig;
use mindloop::debate::{Consensus, Role};

use super::build_reviewer;

/// Run the multi-round review over `candidate` and print the transcript.
pub async fn debate(config: &MindloopConfig, candidate: &str, rounds: Option<usize>) -> Result<()> {
    let reviewer = build_reviewer(config, rounds.unwrap_or(config.debate.rounds))?;
    let outcome = reviewer.validate(candidate).await?;

    for (i, turn) in outcome.transcript.iter().enumerate() {
        let who = match turn.role {
            Role::Permissive => "permissive",
            Role::Critical => "critical",
        };
        println!("Round {} [{who}]", i / 2 + 1);
        println!("{}\n", turn.content.trim());
    }

    let verdict = match outcome.consensus {
        Consensus::Accept => "accept",
        Consensus::Reject => "reject",
        Consensus::NeedsReview => "needs review",
    };
    println!("Consensus: {verdict}");
    Ok(())
}
