// src/curate/state.rs
//! Run state machine: Collecting → Deduplicating → Categorizing → Scoring →
//! Validating → Done, strictly forward. Any stage may end in `Failed`.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Collecting,
    Deduplicating,
    Categorizing,
    Scoring,
    Validating,
    Done,
    Failed,
}

impl Stage {
    /// The only legal successor on the happy path.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Collecting => Some(Stage::Deduplicating),
            Stage::Deduplicating => Some(Stage::Categorizing),
            Stage::Categorizing => Some(Stage::Scoring),
            Stage::Scoring => Some(Stage::Validating),
            Stage::Validating => Some(Stage::Done),
            Stage::Done | Stage::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

/// Survivors per stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageCounts {
    pub raw: usize,
    pub normalized: usize,
    pub deduplicated: usize,
    pub categorized: usize,
    pub scored: usize,
    pub ranked: usize,
    pub validated: usize,
}

impl fmt::Display for StageCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "raw={} normalized={} deduplicated={} categorized={} scored={} ranked={} validated={}",
            self.raw,
            self.normalized,
            self.deduplicated,
            self.categorized,
            self.scored,
            self.ranked,
            self.validated
        )
    }
}

/// Tracks where a run is. Transitions only ever move forward.
#[derive(Debug)]
pub struct PipelineRun {
    stage: Stage,
    pub counts: StageCounts,
}

impl PipelineRun {
    pub fn start(raw: usize) -> Self {
        Self {
            stage: Stage::Collecting,
            counts: StageCounts {
                raw,
                ..StageCounts::default()
            },
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Move to the successor stage. Returns the new stage; terminal stages stay put.
    pub fn advance(&mut self) -> Stage {
        if let Some(next) = self.stage.next() {
            tracing::debug!(target: "curate", from = ?self.stage, to = ?next, "stage transition");
            self.stage = next;
        }
        self.stage
    }

    /// Terminal failure. Returns the stage the run was in when it failed.
    pub fn fail(&mut self) -> Stage {
        let at = self.stage;
        self.stage = Stage::Failed;
        at
    }
}
