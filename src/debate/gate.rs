//! Memory admission gate.

use serde::Serialize;

use super::action::audit_record;
use super::{gate_outcome, DebateEngine, Outcome};
use crate::error::Result;
use crate::judge::{prompts, Judgment};
use crate::memory::cycles::{CandidateKind, DebateRecord};

#[derive(Debug, Clone, Serialize)]
pub struct Admission {
    pub candidate: String,
    pub outcome: Outcome,
    pub persona: Judgment,
    pub neutral: Judgment,
}

impl Admission {
    pub fn admitted(&self) -> bool {
        self.outcome.is_accepted()
    }

    /// Persona's importance estimate, 0 when absent.
    pub fn importance(&self) -> f64 {
        self.persona.verdict().and_then(|v| v.importance).unwrap_or(0.0)
    }

    /// Persona's uncertainty estimate, 0 when absent.
    pub fn uncertainty(&self) -> f64 {
        self.persona.verdict().and_then(|v| v.uncertainty).unwrap_or(0.0)
    }

    pub fn to_record(&self, cycle_id: Option<i64>, persona_name: &str) -> DebateRecord {
        audit_record(
            CandidateKind::Memory,
            &self.candidate,
            cycle_id,
            persona_name,
            &self.persona,
            &self.neutral,
            self.outcome,
            None,
        )
    }
}

impl DebateEngine {
    /// Judge whether `candidate` should become a memory.
    pub async fn admit(&self, candidate: &str, veto_risk: f64) -> Result<Admission> {
        let (persona, neutral) = self
            .both(|system| prompts::judge(system, candidate))
            .await?;
        let outcome = gate_outcome(&persona, &neutral, veto_risk);
        tracing::debug!(outcome = outcome.as_str(), "memory candidate judged");
        Ok(Admission {
            candidate: candidate.to_string(),
            outcome,
            persona,
            neutral,
        })
    }

    /// Persona accepts and the neutral judge does not veto.
    pub async fn should_store(&self, candidate: &str, veto_risk: f64) -> Result<bool> {
        Ok(self.admit(candidate, veto_risk).await?.admitted())
    }
}
