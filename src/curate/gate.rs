// src/curate/gate.rs
//! Validator gate: cheap local pre-filter, then the external relevance judge in
//! bounded batches.
//!
//! The gate fails open. A batch whose judge call errors, times out or answers
//! for only part of the batch is kept as-is and recorded as a
//! `ValidatorUnavailable` issue. The run never fails because of the judge.

use crate::config::ValidatorConfig;
use crate::curate::error::{CurationIssue, FailOpenCause};
use crate::trend::{Category, Trend};
use crate::validator::{DynJudge, JudgeRequest, JudgeResponse, ValidatorError};
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use regex::Regex;
use serde::Serialize;
use std::time::Duration as StdDuration;

/// A trend the gate dropped, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub id: String,
    pub title: String,
    pub source_name: String,
    pub reason: String,
}

impl Rejection {
    fn of(t: &Trend, reason: String) -> Self {
        Self {
            id: t.id.clone(),
            title: t.title.clone(),
            source_name: t.source_name.clone(),
            reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correction {
    pub id: String,
    pub from: Option<Category>,
    pub to: Category,
}

#[derive(Debug, Default)]
pub struct GateOutcome {
    /// Survivors in input order.
    pub kept: Vec<Trend>,
    pub rejected: Vec<Rejection>,
    pub corrections: Vec<Correction>,
    pub issues: Vec<CurationIssue>,
    pub batches: usize,
}

pub struct ValidatorGate {
    judge: DynJudge,
    patterns: Vec<Regex>,
    trusted: Vec<String>,
    batch_size: usize,
    timeout: StdDuration,
    concurrency: usize,
    apply_corrections: bool,
    max_age: Option<Duration>,
    fallback: Category,
}

impl ValidatorGate {
    pub fn new(cfg: &ValidatorConfig, judge: DynJudge, fallback: Category) -> anyhow::Result<Self> {
        let patterns = cfg
            .irrelevant_patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i){p}")).with_context(|| format!("irrelevant pattern `{p}`")))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self {
            judge,
            patterns,
            trusted: cfg
                .trusted_sources
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            batch_size: cfg.batch_size.max(1),
            timeout: StdDuration::from_millis(cfg.timeout_ms.max(1)),
            concurrency: cfg.max_concurrent_batches.max(1),
            apply_corrections: cfg.apply_corrections,
            max_age: cfg.max_age_days.map(|d| Duration::days(i64::from(d))),
            fallback,
        })
    }

    pub fn judge_name(&self) -> &'static str {
        self.judge.name()
    }

    /// Trusted sources are never rejected, by rule or by judge. Names match whole,
    /// ignoring case and surrounding whitespace.
    pub fn is_trusted(&self, t: &Trend) -> bool {
        let src = t.source_name.trim().to_lowercase();
        self.trusted.iter().any(|s| *s == src)
    }

    /// Local rules only: junk patterns over title + summary, optional age cutoff.
    pub fn prefilter(&self, trends: Vec<Trend>, now: DateTime<Utc>) -> (Vec<Trend>, Vec<Rejection>) {
        let mut kept = Vec::with_capacity(trends.len());
        let mut rejected = Vec::new();
        for t in trends {
            if self.is_trusted(&t) {
                kept.push(t);
                continue;
            }
            let content = t.content_lower();
            if let Some(p) = self.patterns.iter().find(|p| p.is_match(&content)) {
                let reason = format!("matched irrelevant pattern: {}", p.as_str().trim_start_matches("(?i)"));
                rejected.push(Rejection::of(&t, reason));
                continue;
            }
            if let Some(max_age) = self.max_age {
                if t.published_at < now - max_age {
                    let reason = format!("too old: {}", t.published_at.format("%Y-%m-%d"));
                    rejected.push(Rejection::of(&t, reason));
                    continue;
                }
            }
            kept.push(t);
        }
        (kept, rejected)
    }

    pub async fn validate(&self, trends: Vec<Trend>, now: DateTime<Utc>) -> GateOutcome {
        let (candidates, mut rejected) = self.prefilter(trends, now);
        if !rejected.is_empty() {
            tracing::info!(target: "gate", rejected = rejected.len(), "pre-filter rejections");
        }
        if candidates.is_empty() {
            return GateOutcome {
                rejected,
                ..GateOutcome::default()
            };
        }

        let batches: Vec<Vec<Trend>> = candidates
            .chunks(self.batch_size)
            .map(<[Trend]>::to_vec)
            .collect();
        let n_batches = batches.len();

        let requests: Vec<Vec<JudgeRequest>> = batches
            .iter()
            .map(|batch| {
                batch
                    .iter()
                    .map(|t| JudgeRequest::from_trend(t, self.fallback))
                    .collect()
            })
            .collect();

        let limit = self.timeout;
        let judge = self.judge.clone();
        let results: Vec<Result<JudgeResponse, ValidatorError>> = stream::iter(requests)
            .map(move |requests| {
                let judge = judge.clone();
                async move {
                    match tokio::time::timeout(limit, judge.judge(&requests)).await {
                        Ok(r) => r,
                        Err(_) => Err(ValidatorError::Timeout),
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut out = GateOutcome {
            batches: n_batches,
            ..GateOutcome::default()
        };

        for (i, (batch, result)) in batches.into_iter().zip(results).enumerate() {
            let response = match result {
                Ok(r) => {
                    let missing = batch
                        .iter()
                        .filter(|t| !r.verdicts.contains_key(&t.id))
                        .count();
                    if missing > 0 {
                        Err(FailOpenCause::Partial(missing))
                    } else {
                        Ok(r)
                    }
                }
                Err(e) => Err(FailOpenCause::from(e)),
            };

            let response = match response {
                Ok(r) => r,
                Err(cause) => {
                    tracing::warn!(target: "gate", batch = i, size = batch.len(), %cause, "judge unavailable, failing open");
                    out.issues.push(CurationIssue::ValidatorUnavailable {
                        batch: i,
                        size: batch.len(),
                        cause,
                    });
                    out.kept.extend(batch);
                    continue;
                }
            };

            for mut t in batch {
                let Some(v) = response.verdicts.get(&t.id) else {
                    out.kept.push(t);
                    continue;
                };
                if !v.relevant && !self.is_trusted(&t) {
                    let reason = v
                        .reason
                        .clone()
                        .unwrap_or_else(|| "judged irrelevant".to_string());
                    rejected.push(Rejection::of(&t, reason));
                    continue;
                }
                if self.apply_corrections {
                    if let Some(to) = v.category.filter(|c| Some(*c) != t.category) {
                        out.corrections.push(Correction {
                            id: t.id.clone(),
                            from: t.category,
                            to,
                        });
                        t.category = Some(to);
                    }
                }
                out.kept.push(t);
            }
        }

        out.rejected = rejected;
        tracing::info!(
            target: "gate",
            judge = self.judge.name(),
            batches = n_batches,
            kept = out.kept.len(),
            rejected = out.rejected.len(),
            corrections = out.corrections.len(),
            fail_open = out.issues.len(),
            "validation done"
        );
        out
    }
}
