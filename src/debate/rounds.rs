//! Multi-round memory debate.
//!
//! A permissive reviewer argues for a candidate memory and a critical reviewer
//! argues against it. Each round both speak once, concurrently, each seeing the
//! other's previous message. The consensus is read off the last message of
//! each role by marker phrases.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::judge::{self, prompts, Judge};

const CRITICAL_MARKERS: &[&str] = &[
    "inaccurate",
    "irrelevant",
    "duplicate",
    "privacy",
    "unsafe",
    "hallucination",
    "speculative",
];

const PERMISSIVE_MARKERS: &[&str] = &[
    "high utility",
    "actionable",
    "accurate",
    "novel",
    "non-duplicative",
    "safe",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Permissive,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebateTurn {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Consensus {
    Accept,
    Reject,
    NeedsReview,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebateOutcome {
    pub consensus: Consensus,
    /// `2 * rounds` turns, permissive first in each round.
    pub transcript: Vec<DebateTurn>,
}

pub struct MemoryDebate {
    permissive: Arc<dyn Judge>,
    critical: Arc<dyn Judge>,
    rounds: usize,
    timeout: Duration,
}

impl MemoryDebate {
    pub fn new(
        permissive: Arc<dyn Judge>,
        critical: Arc<dyn Judge>,
        rounds: usize,
        timeout: Duration,
    ) -> Result<Self> {
        if rounds < 1 {
            return Err(Error::config("debate rounds must be at least 1"));
        }
        Ok(Self {
            permissive,
            critical,
            rounds,
            timeout,
        })
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub async fn validate(&self, candidate: &str) -> Result<DebateOutcome> {
        let mut transcript = Vec::with_capacity(2 * self.rounds);
        let mut last: Option<(String, String)> = None;

        for round in 1..=self.rounds {
            let (p_prompt, c_prompt) = match &last {
                None => (
                    prompts::reviewer(prompts::PERMISSIVE_INSTRUCTION, candidate, None),
                    prompts::reviewer(prompts::CRITICAL_INSTRUCTION, candidate, None),
                ),
                Some((p_prev, c_prev)) => (
                    prompts::reviewer(prompts::PERMISSIVE_INSTRUCTION, candidate, Some(c_prev)),
                    prompts::reviewer(prompts::CRITICAL_INSTRUCTION, candidate, Some(p_prev)),
                ),
            };
            let (p, c) = tokio::join!(
                judge::ask(&self.permissive, p_prompt, self.timeout),
                judge::ask(&self.critical, c_prompt, self.timeout),
            );
            let (p, c) = (p?, c?);
            tracing::debug!(round, "debate round complete");

            transcript.push(DebateTurn {
                role: Role::Permissive,
                content: p.clone(),
            });
            transcript.push(DebateTurn {
                role: Role::Critical,
                content: c.clone(),
            });
            last = Some((p, c));
        }

        let consensus = decide(&transcript);
        tracing::info!(?consensus, rounds = self.rounds, "memory debate finished");
        Ok(DebateOutcome {
            consensus,
            transcript,
        })
    }
}

/// Consensus from the last message of each role. Critical markers win over
/// permissive ones. Matching is a case-insensitive substring test.
pub fn decide(transcript: &[DebateTurn]) -> Consensus {
    let last = |role: Role| {
        transcript
            .iter()
            .rev()
            .find(|t| t.role == role)
            .map(|t| t.content.to_lowercase())
    };
    let has_any = |text: &Option<String>, markers: &[&str]| {
        text.as_deref()
            .is_some_and(|t| markers.iter().any(|m| t.contains(m)))
    };

    if has_any(&last(Role::Critical), CRITICAL_MARKERS) {
        Consensus::Reject
    } else if has_any(&last(Role::Permissive), PERMISSIVE_MARKERS) {
        Consensus::Accept
    } else {
        Consensus::NeedsReview
    }
}
