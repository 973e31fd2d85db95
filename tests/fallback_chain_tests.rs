//! Behavioral tests for the fallback execution chain.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use videoforge::fallback::{run_chain, Candidate, ChainError};

fn counted_failure(name: &str, counter: Arc<AtomicU32>) -> Candidate {
    let reason = format!("{} is unavailable", name);
    Candidate::new(name, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(reason)
    })
}

fn counted_success(name: &str, artifact: PathBuf, counter: Arc<AtomicU32>) -> Candidate {
    Candidate::new(name, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        std::fs::write(&artifact, b"video-bytes").map_err(|e| e.to_string())
    })
}

#[test]
fn test_chain_reports_winner_after_ordered_failures() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("out.mp4");

    let a_runs = Arc::new(AtomicU32::new(0));
    let b_runs = Arc::new(AtomicU32::new(0));
    let c_runs = Arc::new(AtomicU32::new(0));

    let report = run_chain(
        vec![
            counted_failure("A", a_runs.clone()),
            counted_failure("B", b_runs.clone()),
            counted_success("C", artifact.clone(), c_runs.clone()),
        ],
        &artifact,
    )
    .unwrap();

    assert_eq!(report.winner, "C");
    // Both failures recorded exactly once, in order.
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[0].name, "A");
    assert_eq!(report.failures[1].name, "B");
    assert_eq!(a_runs.load(Ordering::SeqCst), 1);
    assert_eq!(b_runs.load(Ordering::SeqCst), 1);
    assert_eq!(c_runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_chain_exhaustion_runs_each_candidate_once() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("out.mp4");

    let a_runs = Arc::new(AtomicU32::new(0));
    let b_runs = Arc::new(AtomicU32::new(0));
    let c_runs = Arc::new(AtomicU32::new(0));

    let err = run_chain(
        vec![
            counted_failure("A", a_runs.clone()),
            counted_failure("B", b_runs.clone()),
            counted_failure("C", c_runs.clone()),
        ],
        &artifact,
    )
    .unwrap_err();

    match err {
        ChainError::Exhausted {
            attempted,
            failures,
            ..
        } => {
            assert_eq!(attempted, 3);
            assert_eq!(
                failures.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
                vec!["A", "B", "C"]
            );
        }
        other => panic!("Expected Exhausted, got {:?}", other),
    }

    // No candidate was retried.
    assert_eq!(a_runs.load(Ordering::SeqCst), 1);
    assert_eq!(b_runs.load(Ordering::SeqCst), 1);
    assert_eq!(c_runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_winner_stops_the_chain() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("out.mp4");

    let later_runs = Arc::new(AtomicU32::new(0));
    let report = run_chain(
        vec![
            counted_success("first", artifact.clone(), Arc::new(AtomicU32::new(0))),
            counted_failure("never-reached", later_runs.clone()),
        ],
        &artifact,
    )
    .unwrap();

    assert_eq!(report.winner, "first");
    assert_eq!(later_runs.load(Ordering::SeqCst), 0);
}

#[test]
fn test_success_claim_without_artifact_is_failure() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("out.mp4");

    let run = |_: ()| {
        run_chain(vec![Candidate::new("optimist", || Ok(()))], &artifact)
    };

    let first = run(()).unwrap_err();
    let second = run(()).unwrap_err();

    // Same classification on every run.
    assert_eq!(first.failures(), second.failures());
    assert!(first.failures()[0].reason.contains("no usable artifact"));
}

#[test]
fn test_zero_byte_output_rejected_but_later_candidate_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("out.mp4");

    let truncator = {
        let artifact = artifact.clone();
        Candidate::new("truncator", move || {
            std::fs::write(&artifact, b"").map_err(|e| e.to_string())
        })
    };
    let writer = {
        let artifact = artifact.clone();
        Candidate::new("writer", move || {
            std::fs::write(&artifact, b"frames").map_err(|e| e.to_string())
        })
    };

    let report = run_chain(vec![truncator, writer], &artifact).unwrap();
    assert_eq!(report.winner, "writer");
    assert_eq!(report.failures[0].name, "truncator");
}

#[test]
fn test_long_failure_reasons_are_truncated() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("out.mp4");

    let noisy = Candidate::new("noisy", || Err("x".repeat(5000)));
    let err = run_chain(vec![noisy], &artifact).unwrap_err();
    assert!(err.failures()[0].reason.len() < 200);
}
