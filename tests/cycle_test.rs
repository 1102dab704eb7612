mod helpers;

use std::sync::Arc;

use helpers::{engine, mind, reviewer, scripted, TIMEOUT};
use mindloop::cycle::{LoopSettings, MindLoop};
use mindloop::debate::{DebateEngine, Outcome};
use mindloop::embedding::hash::HashEmbedder;
use mindloop::index::VectorIndex;
use mindloop::judge::{create_judges, Judge};
use mindloop::memory::artifacts::artifacts_for_cycle;
use mindloop::memory::cycles::{debate_outcomes, get_cycle};
use mindloop::memory::store::get_memory;
use mindloop::memory::MemoryKind;
use tempfile::TempDir;

const PLAN: &str = "1. gather the logs\n2. summarize the errors\nWhich service failed first?";
const CRITIQUE: &str = "Risk: logs may be rotated. Improve: check retention first.";
const EXPLANATION: &str = "Summarized the failing service's errors after gathering logs.";
const NEUTRAL_OK: &str = r#"{"label":"ACCEPT","reason":"fine","risk":0.1,"utility":0.5}"#;

/// Persona: plan, critique, two action evaluations, memory admission.
/// Neutral: two action evaluations, explanation, memory admission.
fn accepting_engine() -> DebateEngine {
    engine(
        scripted(
            "persona",
            &[
                PLAN,
                CRITIQUE,
                r#"{"label":"ACCEPT","utility":0.4,"risk":0.1}"#,
                r#"{"label":"ACCEPT","utility":0.9,"risk":0.1}"#,
                r#"{"label":"ACCEPT","reason":"useful","risk":0.1,"importance":0.7,"uncertainty":0.2}"#,
            ],
        ),
        scripted(
            "neutral",
            &[NEUTRAL_OK, NEUTRAL_OK, EXPLANATION, r#"{"label":"ACCEPT","risk":0.2}"#],
        ),
    )
}

#[tokio::test]
async fn full_cycle_records_artifacts_decisions_and_memory() {
    let mut mind = mind(accepting_engine(), reviewer(&["ok"], &["ok"], 1));
    let report = mind.run_cycle("The nightly job failed.").await.unwrap();

    assert_eq!(report.plan, PLAN);
    assert_eq!(report.decisions.len(), 2);
    assert_eq!(report.chosen.as_deref(), Some("do: summarize the errors"));
    assert_eq!(report.explanation, EXPLANATION);
    assert_eq!(report.admission.outcome, Outcome::Accepted);

    let conn = mind.connection();
    let kinds: Vec<String> = artifacts_for_cycle(conn, report.cycle_id)
        .unwrap()
        .into_iter()
        .map(|a| a.kind)
        .collect();
    assert_eq!(kinds, ["input", "plan", "critique", "action", "explanation"]);
    assert!(get_cycle(conn, report.cycle_id).unwrap().unwrap().ended_at.is_some());
    assert_eq!(debate_outcomes(conn, report.cycle_id).unwrap().len(), 3);

    let id = report.memory_id.unwrap();
    let memory = get_memory(conn, &id).unwrap().unwrap();
    assert_eq!(memory.content, EXPLANATION);
    assert_eq!(memory.kind, MemoryKind::Reflection);
    assert_eq!(memory.provenance, Some(format!("cycle:{}", report.cycle_id)));
    assert!((memory.importance - 0.7).abs() < 1e-9);
    assert_eq!(mind.index().len().unwrap(), 1);
    assert_eq!(mind.pool().len(), 1);
}

#[tokio::test]
async fn stub_judges_run_end_to_end_without_storing() {
    let judges = create_judges(&Default::default()).unwrap();
    let engine = DebateEngine::new(judges.clone(), TIMEOUT);
    let reviewer = mindloop::debate::MemoryDebate::new(judges.persona, judges.neutral, 1, TIMEOUT).unwrap();
    let mut mind = mind(engine, reviewer);

    let report = mind.run_cycle("tidy the desk").await.unwrap();
    assert!(report.chosen.is_none());
    assert!(report.memory_id.is_none());
    assert_eq!(report.admission.outcome, Outcome::Unparseable);
    assert!(mind.index().is_empty().unwrap());
}

#[tokio::test]
async fn rejected_memories_are_forgotten_at_checkpoint() {
    let mut mind = mind(
        accepting_engine(),
        reviewer(&["High utility."], &["This is speculative and inaccurate."], 2),
    );
    let report = mind.run_cycle("The nightly job failed.").await.unwrap();
    let id = report.memory_id.unwrap();

    let curation = mind.checkpoint().await.unwrap();
    assert_eq!(curation.reviewed, 1);
    assert_eq!(curation.forgotten, vec![id.clone()]);
    assert!(get_memory(mind.connection(), &id).unwrap().is_none());
    assert!(mind.index().is_empty().unwrap());
    assert!(mind.pool().is_empty());
}

#[tokio::test]
async fn validated_memories_are_kept_and_not_reviewed_twice() {
    let mut mind = mind(accepting_engine(), reviewer(&["Accurate and novel."], &["Fine."], 1));
    let report = mind.run_cycle("The nightly job failed.").await.unwrap();

    let first = mind.checkpoint().await.unwrap();
    assert_eq!(first.validated, vec![report.memory_id.clone().unwrap()]);
    assert!(mind.pool().entries()[0].curated);

    let second = mind.checkpoint().await.unwrap();
    assert_eq!(second.reviewed, 0);
}

#[tokio::test]
async fn judge_failure_aborts_the_cycle() {
    let down: Arc<dyn Judge> = Arc::new(mindloop::judge::stub::ScriptedJudge::failing("down"));
    let engine = DebateEngine::new(
        mindloop::judge::JudgePair {
            persona: Arc::clone(&down),
            neutral: down,
        },
        TIMEOUT,
    );
    let mut mind = mind(engine, reviewer(&["ok"], &["ok"], 1));
    let err = mind.run_cycle("anything").await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn finish_persists_the_index() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("vectors.idx");
    let mut mind = MindLoop::new(
        helpers::test_db(),
        VectorIndex::open(&path, Some(32)).unwrap(),
        Arc::new(HashEmbedder::new(32)),
        accepting_engine(),
        reviewer(&["Actionable."], &["Fine."], 1),
        LoopSettings::default(),
    );
    mind.run_cycle("The nightly job failed.").await.unwrap();
    let curation = mind.finish().await.unwrap();
    assert_eq!(curation.validated.len(), 1);

    let reloaded = VectorIndex::open(&path, Some(32)).unwrap();
    assert_eq!(reloaded.len().unwrap(), 1);
}

#[tokio::test]
async fn second_cycle_recalls_the_first_cycle() {
    let mut mind = mind(accepting_engine(), reviewer(&["ok"], &["ok"], 1));
    mind.run_cycle("The nightly job failed.").await.unwrap();
    let report = mind.run_cycle("Why did the nightly job fail?").await.unwrap();
    assert!(!report.recalled.is_empty());
}
