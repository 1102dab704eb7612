//! The loop sequencer.
//!
//! [`MindLoop`] owns the stores, the embedder and the debate engines for one
//! run. Each call to [`MindLoop::run_cycle`] does, in order:
//!
//! 1. open a cycle and record the input as an artifact
//! 2. hybrid recall against the input
//! 3. plan and critique with the persona
//! 4. evaluate candidate actions, auditing every decision, and record the chosen one
//! 5. explain the cycle with the neutral judge
//! 6. put the cycle summary through the memory gate; admitted summaries become
//!    memories and join the [`MemoryPool`]
//!
//! [`MindLoop::checkpoint`] reviews pooled memories with the multi-round debate
//! and forgets the ones it rejects. Actions are recorded, never executed.

use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;
use serde::Serialize;

use crate::bounded::call_blocking;
use crate::debate::{Admission, Consensus, DebateEngine, Decision, MemoryDebate};
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::VectorIndex;
use crate::judge::{self, prompts};
use crate::memory::{self, artifacts, cycles, store, MemoryKind, RecallHit, RecallParams};

/// Most candidate actions taken from one plan.
const MAX_CANDIDATES: usize = 7;

/// Knobs for a run, usually filled from [`crate::config::MindloopConfig`].
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub seed: i64,
    pub veto_risk: f64,
    pub recall: RecallParams,
    pub embed_timeout: Duration,
    /// Run [`MindLoop::checkpoint`] after every N cycles; 0 disables it.
    pub curate_every: usize,
    pub config_hash: Option<String>,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            veto_risk: 0.6,
            recall: RecallParams::default(),
            embed_timeout: Duration::from_secs(30),
            curate_every: 0,
            config_hash: None,
        }
    }
}

/// A memory admitted during this run, awaiting or past curation.
#[derive(Debug, Clone, Serialize)]
pub struct PoolEntry {
    pub memory_id: String,
    pub content: String,
    pub cycle_id: i64,
    pub curated: bool,
}

/// Memories admitted during this run.
#[derive(Debug, Default)]
pub struct MemoryPool {
    entries: Vec<PoolEntry>,
}

impl MemoryPool {
    pub fn push(&mut self, memory_id: String, content: String, cycle_id: i64) {
        self.entries.push(PoolEntry {
            memory_id,
            content,
            cycle_id,
            curated: false,
        });
    }

    pub fn entries(&self) -> &[PoolEntry] {
        &self.entries
    }

    pub fn pending(&self) -> impl Iterator<Item = &PoolEntry> {
        self.entries.iter().filter(|e| !e.curated)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn mark_curated(&mut self, memory_id: &str) {
        if let Some(e) = self.entries.iter_mut().find(|e| e.memory_id == memory_id) {
            e.curated = true;
        }
    }

    fn remove(&mut self, memory_id: &str) {
        self.entries.retain(|e| e.memory_id != memory_id);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: i64,
    pub recalled: Vec<RecallHit>,
    pub plan: String,
    pub critique: String,
    pub decisions: Vec<Decision>,
    pub chosen: Option<String>,
    pub explanation: String,
    pub admission: Admission,
    /// Id of the memory created this cycle, if the gate admitted one.
    pub memory_id: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct CheckpointReport {
    pub reviewed: usize,
    pub validated: Vec<String>,
    pub forgotten: Vec<String>,
    pub needs_review: Vec<String>,
}

pub struct MindLoop {
    conn: Connection,
    index: VectorIndex,
    embedder: Arc<dyn EmbeddingProvider>,
    engine: DebateEngine,
    reviewer: MemoryDebate,
    pool: MemoryPool,
    settings: LoopSettings,
    cycles_run: usize,
}

impl MindLoop {
    pub fn new(
        conn: Connection,
        index: VectorIndex,
        embedder: Arc<dyn EmbeddingProvider>,
        engine: DebateEngine,
        reviewer: MemoryDebate,
        settings: LoopSettings,
    ) -> Self {
        Self {
            conn,
            index,
            embedder,
            engine,
            reviewer,
            pool: MemoryPool::default(),
            settings,
            cycles_run: 0,
        }
    }

    pub fn pool(&self) -> &MemoryPool {
        &self.pool
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedder = Arc::clone(&self.embedder);
        let text = text.to_string();
        call_blocking("embedding provider", self.settings.embed_timeout, move || {
            embedder.embed(&text)
        })
        .await
    }

    fn record_artifact(&mut self, cycle_id: i64, kind: &str, content: &str) -> Result<i64> {
        let now = chrono::Utc::now().to_rfc3339();
        artifacts::add_artifact(&mut self.conn, cycle_id, kind, content, &now)
    }

    pub async fn run_cycle(&mut self, input: &str) -> Result<CycleReport> {
        let cycle_id =
            cycles::begin_cycle(&self.conn, self.settings.seed, self.settings.config_hash.as_deref())?;
        tracing::info!(cycle = cycle_id, "cycle start");
        self.record_artifact(cycle_id, "input", input)?;

        let query = self.embed(input).await?;
        let recalled = memory::recall(&self.conn, &self.index, input, &query, self.settings.recall)?;
        let recall_text = render_recall(&recalled);

        let timeout = self.engine.timeout();
        let persona = Arc::clone(&self.engine.judges().persona);
        let neutral = Arc::clone(&self.engine.judges().neutral);

        let plan = judge::ask(
            &persona,
            prompts::planner(self.engine.persona_system(), input, &recall_text),
            timeout,
        )
        .await?
        .trim()
        .to_string();
        self.record_artifact(cycle_id, "plan", &plan)?;

        let critique = judge::ask(
            &persona,
            prompts::critic(self.engine.persona_system(), &plan),
            timeout,
        )
        .await?
        .trim()
        .to_string();
        self.record_artifact(cycle_id, "critique", &critique)?;

        let candidates = extract_candidates(&plan, input);
        let context = format!("Input:\n{input}\n\nPlan:\n{plan}\n\nCritique:\n{critique}");
        let decisions = self
            .engine
            .evaluate_actions(&candidates, &context, self.settings.veto_risk)
            .await?;
        for d in &decisions {
            cycles::record_debate(&self.conn, &d.to_record(Some(cycle_id), self.engine.persona_name()))?;
        }
        let chosen = crate::debate::action::select_best(&decisions).map(|d| d.action.clone());
        if let Some(action) = &chosen {
            self.record_artifact(cycle_id, "action", action)?;
        }

        let explanation = judge::ask(
            &neutral,
            prompts::explainer(
                self.engine.neutral_system(),
                input,
                &plan,
                &critique,
                chosen.as_deref().unwrap_or("(none)"),
            ),
            timeout,
        )
        .await?
        .trim()
        .to_string();
        self.record_artifact(cycle_id, "explanation", &explanation)?;

        let candidate = format!(
            "{input}\n{plan}\n{critique}\n{}",
            chosen.as_deref().unwrap_or("(no action)")
        );
        let admission = self.engine.admit(&candidate, self.settings.veto_risk).await?;
        cycles::record_debate(
            &self.conn,
            &admission.to_record(Some(cycle_id), self.engine.persona_name()),
        )?;

        let memory_id = if admission.admitted() {
            let vector = self.embed(&explanation).await?;
            let provenance = format!("cycle:{cycle_id}");
            let memory = store::NewMemory {
                importance: admission.importance(),
                uncertainty: admission.uncertainty(),
                provenance: Some(&provenance),
                ..store::NewMemory::new(&explanation, MemoryKind::Reflection)
            };
            let record = store::remember(&mut self.conn, &mut self.index, &memory, &vector)?;
            self.pool.push(record.id.clone(), explanation.clone(), cycle_id);
            Some(record.id)
        } else {
            None
        };

        cycles::end_cycle(&self.conn, cycle_id)?;
        self.cycles_run += 1;
        tracing::info!(
            cycle = cycle_id,
            action = chosen.as_deref().unwrap_or("-"),
            admitted = memory_id.is_some(),
            "cycle end"
        );

        if self.settings.curate_every > 0 && self.cycles_run % self.settings.curate_every == 0 {
            self.checkpoint().await?;
        }

        Ok(CycleReport {
            cycle_id,
            recalled,
            plan,
            critique,
            decisions,
            chosen,
            explanation,
            admission,
            memory_id,
        })
    }

    /// Debate every uncurated pool entry. Rejected memories are forgotten.
    pub async fn checkpoint(&mut self) -> Result<CheckpointReport> {
        let pending: Vec<PoolEntry> = self.pool.pending().cloned().collect();
        let mut report = CheckpointReport {
            reviewed: pending.len(),
            ..Default::default()
        };

        for entry in pending {
            let outcome = self.reviewer.validate(&entry.content).await?;
            match outcome.consensus {
                Consensus::Reject => {
                    store::forget(&mut self.conn, &mut self.index, &entry.memory_id)?;
                    self.pool.remove(&entry.memory_id);
                    report.forgotten.push(entry.memory_id);
                }
                Consensus::Accept => {
                    self.pool.mark_curated(&entry.memory_id);
                    report.validated.push(entry.memory_id);
                }
                Consensus::NeedsReview => {
                    self.pool.mark_curated(&entry.memory_id);
                    report.needs_review.push(entry.memory_id);
                }
            }
        }

        tracing::info!(
            reviewed = report.reviewed,
            forgotten = report.forgotten.len(),
            "memory pool curated"
        );
        Ok(report)
    }

    /// Curate what is left in the pool and persist the index.
    pub async fn finish(mut self) -> Result<CheckpointReport> {
        let report = self.checkpoint().await?;
        if self.index.path().is_some() {
            self.index.persist()?;
        }
        Ok(report)
    }
}

fn render_recall(hits: &[RecallHit]) -> String {
    if hits.is_empty() {
        return "(nothing recalled)".to_string();
    }
    hits.iter()
        .map(|h| format!("- {}", h.content.lines().next().unwrap_or("")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Plan steps written as `- `, `* ` or `N.` / `N)` list items. Falls back to
/// acting on the input itself.
pub fn extract_candidates(plan: &str, input: &str) -> Vec<String> {
    let mut out: Vec<String> = plan
        .lines()
        .filter_map(|line| list_item(line.trim()))
        .filter(|s| !s.is_empty())
        .map(|s| format!("do: {s}"))
        .take(MAX_CANDIDATES)
        .collect();
    if out.is_empty() {
        out.push(format!("do: {}", input.trim()));
    }
    out
}

fn list_item(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return Some(rest.trim());
    }
    let digits = line.find(|c: char| !c.is_ascii_digit())?;
    if digits == 0 {
        return None;
    }
    let rest = &line[digits..];
    rest.strip_prefix('.')
        .or_else(|| rest.strip_prefix(')'))
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_from_list_items() {
        let plan = "Here is the plan:\n1. gather logs\n2) read them\n- summarize\n* report back\n3 missing dot";
        assert_eq!(
            extract_candidates(plan, "ignored"),
            vec!["do: gather logs", "do: read them", "do: summarize", "do: report back"]
        );
    }

    #[test]
    fn candidates_fall_back_to_input() {
        assert_eq!(
            extract_candidates("[persona] no steps", "  tidy the desk "),
            vec!["do: tidy the desk"]
        );
    }

    #[test]
    fn candidates_are_capped() {
        let plan: String = (1..=12).map(|i| format!("{i}. step {i}\n")).collect();
        assert_eq!(extract_candidates(&plan, "x").len(), MAX_CANDIDATES);
    }

    #[test]
    fn pool_tracks_curation() {
        let mut pool = MemoryPool::default();
        pool.push("a".into(), "x".into(), 1);
        pool.push("b".into(), "y".into(), 1);
        pool.mark_curated("a");
        assert_eq!(pool.pending().count(), 1);
        pool.remove("b");
        assert_eq!(pool.len(), 1);
        assert!(pool.pending().next().is_none());
    }

    #[test]
    fn recall_rendering() {
        assert_eq!(render_recall(&[]), "(nothing recalled)");
    }
}
