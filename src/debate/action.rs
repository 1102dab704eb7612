//! Action selection.
//!
//! Each candidate action is evaluated by both judges. Among the accepted
//! candidates the one with the strictly greatest expected value wins; on a tie
//! the earlier candidate stays.

use serde::Serialize;

use super::{gate_outcome, DebateEngine, Outcome};
use crate::error::Result;
use crate::judge::{prompts, Judgment};
use crate::memory::cycles::{CandidateKind, DebateRecord};

const PERSONA_WEIGHT: f64 = 0.7;
const NEUTRAL_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub action: String,
    pub outcome: Outcome,
    pub persona: Judgment,
    pub neutral: Judgment,
    /// Set only for accepted actions.
    pub expected_value: Option<f64>,
}

impl Decision {
    pub fn accepted(&self) -> bool {
        self.outcome.is_accepted()
    }

    /// Audit row for this decision.
    pub fn to_record(&self, cycle_id: Option<i64>, persona_name: &str) -> DebateRecord {
        audit_record(
            CandidateKind::Action,
            &self.action,
            cycle_id,
            persona_name,
            &self.persona,
            &self.neutral,
            self.outcome,
            self.expected_value,
        )
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn audit_record(
    kind: CandidateKind,
    subject: &str,
    cycle_id: Option<i64>,
    persona_name: &str,
    persona: &Judgment,
    neutral: &Judgment,
    outcome: Outcome,
    expected_value: Option<f64>,
) -> DebateRecord {
    DebateRecord {
        cycle_id,
        candidate_kind: kind,
        subject: subject.to_string(),
        persona_name: Some(persona_name.to_string()),
        persona_label: persona.label_str().map(str::to_string),
        persona_reason: persona.verdict().map(|v| v.reason.clone()),
        persona_risk: persona.risk(),
        neutral_label: neutral.label_str().map(str::to_string),
        neutral_reason: neutral.verdict().map(|v| v.reason.clone()),
        neutral_risk: neutral.risk(),
        outcome: outcome.as_str().to_string(),
        expected_value,
    }
}

/// `0.7 * pu * (1 - pr) + 0.3 * nu * (1 - nr)`; absent numbers count as 0.
pub fn expected_value(persona: &Judgment, neutral: &Judgment) -> f64 {
    let term = |j: &Judgment| {
        let v = j.verdict();
        let utility = v.and_then(|v| v.utility).unwrap_or(0.0);
        let risk = v.and_then(|v| v.risk).unwrap_or(0.0);
        utility * (1.0 - risk)
    };
    PERSONA_WEIGHT * term(persona) + NEUTRAL_WEIGHT * term(neutral)
}

/// The accepted decision with the strictly greatest expected value.
pub fn select_best(decisions: &[Decision]) -> Option<&Decision> {
    let mut best: Option<&Decision> = None;
    for d in decisions {
        let Some(ev) = d.expected_value.filter(|_| d.accepted()) else {
            continue;
        };
        match best.and_then(|b| b.expected_value) {
            Some(best_ev) if ev <= best_ev => {}
            _ => best = Some(d),
        }
    }
    best
}

impl DebateEngine {
    pub async fn evaluate_action(
        &self,
        action: &str,
        context: &str,
        veto_risk: f64,
    ) -> Result<Decision> {
        let (persona, neutral) = self
            .both(|system| prompts::evaluate(system, context, action))
            .await?;
        let outcome = gate_outcome(&persona, &neutral, veto_risk);
        let expected_value = outcome
            .is_accepted()
            .then(|| expected_value(&persona, &neutral));

        tracing::debug!(
            action,
            outcome = outcome.as_str(),
            ?expected_value,
            "action evaluated"
        );
        Ok(Decision {
            action: action.to_string(),
            outcome,
            persona,
            neutral,
            expected_value,
        })
    }

    /// Evaluate every candidate, in order. Stops at the first judge failure.
    pub async fn evaluate_actions(
        &self,
        candidates: &[String],
        context: &str,
        veto_risk: f64,
    ) -> Result<Vec<Decision>> {
        let mut decisions = Vec::with_capacity(candidates.len());
        for action in candidates {
            decisions.push(self.evaluate_action(action, context, veto_risk).await?);
        }
        Ok(decisions)
    }

    /// Pick the best accepted action, or `None` if nothing was accepted.
    pub async fn decide(
        &self,
        candidates: &[String],
        context: &str,
        veto_risk: f64,
    ) -> Result<Option<Decision>> {
        let decisions = self.evaluate_actions(candidates, context, veto_risk).await?;
        Ok(select_best(&decisions).cloned())
    }
}
