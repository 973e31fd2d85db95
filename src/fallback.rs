//! Ordered-attempt execution for artifact producers.
//!
//! A chain holds a list of named candidate methods that all try to produce
//! the same file. Candidates run strictly in order; the first one whose
//! output actually lands on disk wins. Failures are collected, never
//! retried.

use std::path::{Path, PathBuf};

/// Maximum length of a failure reason kept in reports and logs.
const REASON_MAX_CHARS: usize = 100;

/// One named alternative way of producing the expected artifact.
///
/// The operation returns `Ok(())` when it believes it succeeded, but the
/// chain does not take its word for it: the artifact must exist and be
/// non-empty on disk before the candidate counts as the winner.
pub struct Candidate {
    name: String,
    op: Box<dyn FnOnce() -> Result<(), String>>,
}

impl Candidate {
    /// Create a candidate from a name and an operation closure.
    pub fn new<F>(name: impl Into<String>, op: F) -> Self
    where
        F: FnOnce() -> Result<(), String> + 'static,
    {
        Self {
            name: name.into(),
            op: Box::new(op),
        }
    }

    /// The candidate's display name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A single recorded candidate failure.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFailure {
    /// Name of the candidate that failed.
    pub name: String,
    /// Truncated human-readable reason.
    pub reason: String,
}

/// Result of a chain that found a working candidate.
#[derive(Debug, Clone)]
pub struct ChainReport {
    /// Name of the winning candidate.
    pub winner: String,
    /// Failures of the candidates attempted before the winner, in order.
    pub failures: Vec<CandidateFailure>,
    /// The verified artifact path.
    pub artifact: PathBuf,
}

/// Errors from running a fallback chain.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("no candidate methods to attempt")]
    Empty,

    #[error("all {attempted} methods failed to produce {artifact}")]
    Exhausted {
        /// Number of candidates attempted.
        attempted: usize,
        /// Display path of the expected artifact.
        artifact: String,
        /// Every candidate failure, in attempt order.
        failures: Vec<CandidateFailure>,
    },
}

impl ChainError {
    /// Failures collected before the chain gave up, if any.
    pub fn failures(&self) -> &[CandidateFailure] {
        match self {
            ChainError::Empty => &[],
            ChainError::Exhausted { failures, .. } => failures,
        }
    }
}

/// Truncate a failure reason to a displayable length.
pub fn truncate_reason(reason: &str) -> String {
    if reason.chars().count() <= REASON_MAX_CHARS {
        return reason.to_string();
    }
    let cut: String = reason.chars().take(REASON_MAX_CHARS).collect();
    format!("{}...", cut)
}

/// Check whether an artifact exists and is non-empty.
///
/// This is the only validity check applied to pipeline outputs.
pub fn artifact_ok(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

/// Run candidates in order until one produces the expected artifact.
///
/// Each candidate is attempted at most once. A candidate fails when its
/// operation returns an error, or when the operation returns `Ok` but the
/// artifact is missing or empty afterwards. Each failure is logged exactly
/// once and the chain advances to the next candidate.
///
/// # Errors
///
/// Returns [`ChainError::Empty`] for an empty candidate list and
/// [`ChainError::Exhausted`] when every candidate failed.
pub fn run_chain(
    candidates: Vec<Candidate>,
    expected_artifact: &Path,
) -> Result<ChainReport, ChainError> {
    if candidates.is_empty() {
        return Err(ChainError::Empty);
    }

    let total = candidates.len();
    let mut failures: Vec<CandidateFailure> = Vec::new();

    for candidate in candidates {
        let name = candidate.name;
        log::info!("Attempting method: {}", name);

        let reason = match (candidate.op)() {
            Ok(()) => {
                if artifact_ok(expected_artifact) {
                    log::info!("Method {} produced {}", name, expected_artifact.display());
                    return Ok(ChainReport {
                        winner: name,
                        failures,
                        artifact: expected_artifact.to_path_buf(),
                    });
                }
                format!(
                    "reported success but no usable artifact at {}",
                    expected_artifact.display()
                )
            }
            Err(e) => e,
        };

        let reason = truncate_reason(&reason);
        log::warn!("Method {} failed: {}", name, reason);
        failures.push(CandidateFailure { name, reason });
    }

    Err(ChainError::Exhausted {
        attempted: total,
        artifact: expected_artifact.display().to_string(),
        failures,
    })
}
