// src/validator/mod.rs
//! Relevance judge: the external check behind the validator gate.
//!
//! The gate only sees the `RelevanceJudge` trait. Concrete judges:
//! - `AcceptAll`: every trend relevant, no corrections (disabled / mock mode)
//! - `LlmJudge`: OpenAI-compatible chat completions over a provider chain
//! - `DailyLimited<J>`: wraps any judge with a per-UTC-day call budget

pub mod llm;

use crate::config::ai::AiConfig;
use crate::curate::error::FailOpenCause;
use crate::trend::{Category, Trend};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub use llm::LlmJudge;

/// What the judge sees of one trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JudgeRequest {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub category: Category,
    pub source_name: String,
}

impl JudgeRequest {
    pub fn from_trend(t: &Trend, fallback: Category) -> Self {
        Self {
            id: t.id.clone(),
            title: t.title.clone(),
            summary: t.summary.clone(),
            category: t.category.unwrap_or(fallback),
            source_name: t.source_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub relevant: bool,
    /// Suggested category; `None` keeps the current one.
    pub category: Option<Category>,
    pub reason: Option<String>,
}

impl Verdict {
    pub fn accept() -> Self {
        Self {
            relevant: true,
            category: None,
            reason: None,
        }
    }
}

/// Verdicts keyed by trend id. Ids absent from the map got no verdict.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JudgeResponse {
    pub verdicts: HashMap<String, Verdict>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidatorError {
    #[error("timed out")]
    Timeout,
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("daily call limit reached")]
    LimitReached,
}

impl From<ValidatorError> for FailOpenCause {
    fn from(e: ValidatorError) -> Self {
        match e {
            ValidatorError::Timeout => FailOpenCause::Timeout,
            ValidatorError::Unavailable(m) => FailOpenCause::Unavailable(m),
            ValidatorError::Malformed(m) => FailOpenCause::Malformed(m),
            ValidatorError::LimitReached => FailOpenCause::LimitReached,
        }
    }
}

#[async_trait]
pub trait RelevanceJudge: Send + Sync {
    async fn judge(&self, batch: &[JudgeRequest]) -> Result<JudgeResponse, ValidatorError>;
    /// Diagnostics label.
    fn name(&self) -> &'static str;
}

pub type DynJudge = Arc<dyn RelevanceJudge>;

/// Accepts everything, corrects nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

#[async_trait]
impl RelevanceJudge for AcceptAll {
    async fn judge(&self, batch: &[JudgeRequest]) -> Result<JudgeResponse, ValidatorError> {
        Ok(JudgeResponse {
            verdicts: batch
                .iter()
                .map(|r| (r.id.clone(), Verdict::accept()))
                .collect(),
        })
    }

    fn name(&self) -> &'static str {
        "accept_all"
    }
}

/// Caps real calls per UTC day. Over the cap every call fails with `LimitReached`
/// and the gate fails open.
pub struct DailyLimited<J> {
    inner: J,
    limit: u32,
    counter: Mutex<(NaiveDate, u32)>,
}

impl<J: RelevanceJudge> DailyLimited<J> {
    pub fn new(inner: J, limit: u32) -> Self {
        Self {
            inner,
            limit,
            counter: Mutex::new((Utc::now().date_naive(), 0)),
        }
    }

    /// Take one call from today's budget.
    fn reserve(&self) -> bool {
        let mut g = self.counter.lock().unwrap_or_else(|e| e.into_inner());
        let today = Utc::now().date_naive();
        if g.0 != today {
            *g = (today, 0);
        }
        if g.1 >= self.limit {
            return false;
        }
        g.1 += 1;
        true
    }

    pub fn used_today(&self) -> u32 {
        let g = self.counter.lock().unwrap_or_else(|e| e.into_inner());
        if g.0 == Utc::now().date_naive() {
            g.1
        } else {
            0
        }
    }
}

#[async_trait]
impl<J: RelevanceJudge> RelevanceJudge for DailyLimited<J> {
    async fn judge(&self, batch: &[JudgeRequest]) -> Result<JudgeResponse, ValidatorError> {
        if !self.reserve() {
            tracing::warn!(target: "validator", limit = self.limit, "daily judge limit reached");
            return Err(ValidatorError::LimitReached);
        }
        self.inner.judge(batch).await
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

fn test_mode() -> bool {
    std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
}

/// Factory from config and environment.
///
/// * `AI_TEST_MODE=mock` → `AcceptAll`
/// * disabled or no keys → `AcceptAll`
/// * otherwise `LlmJudge` wrapped in the daily limit
pub fn build_judge(cfg: &AiConfig) -> DynJudge {
    if test_mode() {
        tracing::info!(target: "validator", "AI_TEST_MODE=mock, accepting all trends");
        return Arc::new(AcceptAll);
    }
    if !cfg.enabled || !cfg.has_keys() {
        tracing::info!(target: "validator", enabled = cfg.enabled, "relevance judge disabled");
        return Arc::new(AcceptAll);
    }
    match LlmJudge::new(cfg) {
        Ok(judge) => {
            tracing::info!(
                target: "validator",
                providers = cfg.providers.len(),
                daily_limit = cfg.daily_limit,
                "relevance judge ready"
            );
            Arc::new(DailyLimited::new(judge, cfg.daily_limit))
        }
        Err(e) => {
            tracing::warn!(target: "validator", error = %e, "could not build relevance judge");
            Arc::new(AcceptAll)
        }
    }
}
