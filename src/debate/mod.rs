//! Debate gating between a persona judge and a neutral judge.
//!
//! The persona judge decides; the neutral judge can only veto, by reporting a
//! risk at or above the configured threshold. A judgment that could not be
//! parsed never counts as approval: an unparseable persona cannot accept and
//! an unparseable neutral cannot confirm safety.
//!
//! - [`action`] evaluates candidate actions and picks the best by expected value.
//! - [`gate`] decides whether a candidate memory is stored.
//! - [`rounds`] runs the multi-round permissive/critical review of a memory.

pub mod action;
pub mod gate;
pub mod rounds;

use std::time::Duration;

use serde::Serialize;

use crate::error::Result;
use crate::judge::{self, JudgePair, Judgment, Prompt};

pub use action::Decision;
pub use gate::Admission;
pub use rounds::{Consensus, DebateOutcome, DebateTurn, MemoryDebate, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Accepted,
    Rejected,
    /// Neutral risk at or above the veto threshold.
    Vetoed,
    /// One of the two judgments held no verdict.
    Unparseable,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Vetoed => "vetoed",
            Self::Unparseable => "unparseable",
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Combine a persona and a neutral judgment. The veto is inclusive and wins
/// over everything else, including an unparseable persona.
pub fn gate_outcome(persona: &Judgment, neutral: &Judgment, veto_risk: f64) -> Outcome {
    if neutral.risk().is_some_and(|r| r >= veto_risk) {
        return Outcome::Vetoed;
    }
    if persona.is_unparseable() || neutral.is_unparseable() {
        return Outcome::Unparseable;
    }
    if persona.accepts() {
        Outcome::Accepted
    } else {
        Outcome::Rejected
    }
}

/// Persona and neutral judges plus the system text that frames each.
pub struct DebateEngine {
    judges: JudgePair,
    persona_name: String,
    persona_system: String,
    neutral_system: String,
    timeout: Duration,
}

impl DebateEngine {
    pub fn new(judges: JudgePair, timeout: Duration) -> Self {
        Self {
            judges,
            persona_name: "persona".into(),
            persona_system: String::new(),
            neutral_system: String::new(),
            timeout,
        }
    }

    /// Persona identity. `system` is prepended to every persona prompt.
    pub fn with_persona(mut self, name: impl Into<String>, system: impl Into<String>) -> Self {
        self.persona_name = name.into();
        self.persona_system = system.into();
        self
    }

    /// Baseline system text for the neutral judge (usually empty).
    pub fn with_neutral_system(mut self, system: impl Into<String>) -> Self {
        self.neutral_system = system.into();
        self
    }

    pub fn persona_name(&self) -> &str {
        &self.persona_name
    }

    pub fn persona_system(&self) -> &str {
        &self.persona_system
    }

    pub fn neutral_system(&self) -> &str {
        &self.neutral_system
    }

    pub fn judges(&self) -> &JudgePair {
        &self.judges
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Ask both judges concurrently. Either failing fails the whole call.
    async fn both(
        &self,
        build: impl Fn(&str) -> Prompt,
    ) -> Result<(Judgment, Judgment)> {
        let (persona, neutral) = tokio::join!(
            judge::evaluate(&self.judges.persona, build(&self.persona_system), self.timeout),
            judge::evaluate(&self.judges.neutral, build(&self.neutral_system), self.timeout),
        );
        Ok((persona?, neutral?))
    }
}
