// src/curate/error.rs
//! Error taxonomy of the curation pipeline.
//!
//! Per-item and per-stage problems are absorbed where they are detected and
//! recorded as `CurationIssue`s on the run. Only a `FailureReason` escapes to
//! the caller, wrapped in a `CurationFailure` that carries the stage counts.

use crate::curate::state::{Stage, StageCounts};
use serde::Serialize;
use thiserror::Error;

/// Why the normalizer refused a raw item.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedItem {
    #[error("missing title")]
    MissingTitle,
    #[error("missing both url and summary")]
    MissingUrlAndSummary,
}

/// Cause of a validator fail-open event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "cause", content = "detail", rename_all = "snake_case")]
pub enum FailOpenCause {
    Timeout,
    Unavailable(String),
    Malformed(String),
    /// Verdicts were missing for this many items of the batch.
    Partial(usize),
    LimitReached,
}

impl std::fmt::Display for FailOpenCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailOpenCause::Timeout => write!(f, "timed out"),
            FailOpenCause::Unavailable(e) => write!(f, "unavailable: {e}"),
            FailOpenCause::Malformed(e) => write!(f, "malformed response: {e}"),
            FailOpenCause::Partial(n) => write!(f, "partial response, {n} verdicts missing"),
            FailOpenCause::LimitReached => write!(f, "daily call limit reached"),
        }
    }
}

/// Reportable, non-fatal conditions recorded during a run.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CurationIssue {
    #[error("malformed item from {source_name}: {reason}")]
    MalformedItem {
        source_name: String,
        reason: MalformedItem,
    },
    #[error("no trends left after deduplication")]
    EmptyAfterDedup,
    #[error("no trends left after categorization")]
    EmptyAfterCategorization,
    #[error("validator unavailable for batch {batch} ({size} trends accepted unvalidated): {cause}")]
    ValidatorUnavailable {
        batch: usize,
        size: usize,
        cause: FailOpenCause,
    },
    #[error("quality gate missed: {detail}")]
    QualityBelowTarget { detail: String },
}

impl CurationIssue {
    pub fn is_fail_open(&self) -> bool {
        matches!(self, CurationIssue::ValidatorUnavailable { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// Zero trends survived through scoring.
    #[error("pipeline exhausted, no trends survived")]
    PipelineExhausted,
    /// The final collection broke an output invariant.
    #[error("invariant violated: {0}")]
    InvariantViolated(String),
}

/// Hard failure of a run. Carries what survived each stage before it.
#[derive(Debug, Clone, Error, Serialize)]
#[error("curation failed at {failed_at:?}: {reason} ({counts})")]
pub struct CurationFailure {
    pub failed_at: Stage,
    pub reason: FailureReason,
    pub counts: StageCounts,
    pub issues: Vec<CurationIssue>,
}
