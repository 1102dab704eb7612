mod helpers;

use std::time::Duration;

use helpers::{reviewer, scripted, TIMEOUT};
use mindloop::debate::{Consensus, MemoryDebate, Role};
use mindloop::Error;

#[tokio::test]
async fn transcript_has_two_turns_per_round() {
    let one = reviewer(&["ok"], &["ok"], 1).validate("m").await.unwrap();
    assert_eq!(one.transcript.len(), 2);

    let three = reviewer(&["ok"], &["ok"], 3).validate("m").await.unwrap();
    assert_eq!(three.transcript.len(), 6);
    let roles: Vec<Role> = three.transcript.iter().map(|t| t.role).collect();
    assert_eq!(
        roles,
        [
            Role::Permissive,
            Role::Critical,
            Role::Permissive,
            Role::Critical,
            Role::Permissive,
            Role::Critical
        ]
    );
}

#[tokio::test]
async fn critical_marker_rejects() {
    let outcome = reviewer(
        &["This has high utility."],
        &["It looks like a DUPLICATE of an older note."],
        2,
    )
    .validate("m")
    .await
    .unwrap();
    assert_eq!(outcome.consensus, Consensus::Reject);
}

#[tokio::test]
async fn permissive_marker_accepts() {
    let outcome = reviewer(&["Concrete and actionable."], &["Wording could be tighter."], 2)
        .validate("m")
        .await
        .unwrap();
    assert_eq!(outcome.consensus, Consensus::Accept);
}

#[tokio::test]
async fn no_markers_need_review() {
    let outcome = reviewer(&["It is a memory."], &["It is a memory."], 1)
        .validate("m")
        .await
        .unwrap();
    assert_eq!(outcome.consensus, Consensus::NeedsReview);
}

#[tokio::test]
async fn earlier_rounds_do_not_decide() {
    let outcome = reviewer(
        &["meh", "Novel insight."],
        &["Possibly speculative.", "Fair enough."],
        2,
    )
    .validate("m")
    .await
    .unwrap();
    assert_eq!(outcome.consensus, Consensus::Accept);
}

#[tokio::test]
async fn later_rounds_answer_the_opponent() {
    let permissive = scripted("permissive", &["P1 argues for", "P2 rebuts"]);
    let critical = scripted("critical", &["C1 argues against", "C2 rebuts"]);
    let debate = MemoryDebate::new(permissive.clone(), critical.clone(), 2, TIMEOUT).unwrap();
    debate.validate("candidate memory").await.unwrap();

    let p = permissive.prompts();
    let c = critical.prompts();
    assert!(!p[0].user.contains("Opponent"));
    assert!(p[1].user.contains("C1 argues against"));
    assert!(c[1].user.contains("P1 argues for"));
    assert!(p.iter().chain(&c).all(|pr| pr.user.contains("candidate memory")));
}

#[test]
fn zero_rounds_is_a_config_error() {
    let result = MemoryDebate::new(scripted("p", &["x"]), scripted("c", &["x"]), 0, TIMEOUT);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn slow_reviewer_times_out() {
    let slow = std::sync::Arc::new(
        mindloop::judge::stub::ScriptedJudge::new("slow", ["ok"])
            .with_delay(Duration::from_millis(500)),
    );
    let debate = MemoryDebate::new(slow, scripted("c", &["ok"]), 1, Duration::from_millis(50)).unwrap();
    assert!(matches!(
        debate.validate("m").await,
        Err(Error::Timeout { .. })
    ));
}
