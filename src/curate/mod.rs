// src/curate/mod.rs
//! Curation coordinator.
//!
//! Runs normalize → dedup → categorize → score/rank → validate over the full
//! multi-source input and returns a `CurationReport`, or a `CurationFailure`
//! carrying the per-stage counts when nothing survives scoring.

pub mod categorize;
pub mod dedup;
pub mod error;
pub mod gate;
pub mod keywords;
pub mod normalize;
pub mod scoring;
pub mod state;
pub mod text;

use crate::config::{CurationConfig, QualityConfig};
use crate::trend::{RawItem, TrendCollection};
use crate::validator::DynJudge;
use chrono::{DateTime, Duration, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::time::Instant;

pub use categorize::Categorizer;
pub use dedup::Deduplicator;
pub use error::{CurationFailure, CurationIssue, FailOpenCause, FailureReason, MalformedItem};
pub use gate::{Correction, Rejection, ValidatorGate};
pub use scoring::Scorer;
pub use state::{PipelineRun, Stage, StageCounts};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("curate_runs_total", "Curation runs started.");
        describe_counter!("curate_failures_total", "Curation runs that ended in Failed.");
        describe_counter!("curate_malformed_total", "Raw items skipped by the normalizer.");
        describe_counter!("curate_dedup_removed_total", "Trends merged away as duplicates.");
        describe_counter!("curate_truncated_total", "Trends dropped by the per-category cap.");
        describe_counter!("curate_rejected_total", "Trends rejected by the validator gate.");
        describe_counter!("curate_fail_open_total", "Validator batches accepted unvalidated.");
        describe_counter!("curate_corrections_total", "Category corrections applied.");
        describe_histogram!("curate_run_ms", "Curation run time in milliseconds.");
        describe_gauge!("curate_last_run_trends", "Trends in the last successful collection.");
        describe_gauge!("curate_last_run_ts", "Unix ts of the last finished run.");
    });
}

/// Output checks that do not gate the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub total: usize,
    pub fresh: usize,
    pub fresh_ratio: f64,
    pub meets_min_trends: bool,
    pub meets_freshness: bool,
}

impl QualityReport {
    pub fn assess(collection: &TrendCollection, cfg: &QualityConfig, now: DateTime<Utc>) -> Self {
        let total = collection.len();
        let window = Duration::seconds((cfg.freshness_hours * 3600.0) as i64);
        let fresh = collection
            .iter()
            .filter(|t| now - t.published_at <= window)
            .count();
        let fresh_ratio = if total == 0 {
            0.0
        } else {
            fresh as f64 / total as f64
        };
        Self {
            total,
            fresh,
            fresh_ratio,
            meets_min_trends: total >= cfg.min_trends,
            meets_freshness: fresh_ratio >= cfg.min_fresh_ratio,
        }
    }

    pub fn passed(&self) -> bool {
        self.meets_min_trends && self.meets_freshness
    }
}

/// Result of a run that reached `Done`.
#[derive(Debug, Clone, Serialize)]
pub struct CurationReport {
    pub collection: TrendCollection,
    pub counts: StageCounts,
    pub issues: Vec<CurationIssue>,
    pub rejected: Vec<Rejection>,
    pub corrections: Vec<Correction>,
    pub keywords: Vec<String>,
    pub quality: QualityReport,
    /// Trends dropped by the cap after corrections moved them into a full category.
    pub recapped: usize,
}

impl CurationReport {
    pub fn fail_open_events(&self) -> usize {
        self.issues.iter().filter(|i| i.is_fail_open()).count()
    }
}

/// Owns the immutable configuration and the compiled stages. Reusable across runs.
pub struct Curator {
    config: CurationConfig,
    dedup: Deduplicator,
    categorizer: Categorizer,
    scorer: Scorer,
    gate: ValidatorGate,
}

impl Curator {
    pub fn new(config: CurationConfig, judge: DynJudge) -> anyhow::Result<Self> {
        let config = config.validated();
        let categorizer = Categorizer::from_config(&config.categories)?;
        let scorer = Scorer::from_config(&config.scoring)?;
        let gate = ValidatorGate::new(&config.validator, judge, categorizer.fallback())?;
        Ok(Self {
            dedup: Deduplicator::from_config(&config.dedup),
            categorizer,
            scorer,
            gate,
            config,
        })
    }

    pub fn config(&self) -> &CurationConfig {
        &self.config
    }

    pub async fn curate(
        &self,
        raw: Vec<RawItem>,
        now: DateTime<Utc>,
    ) -> Result<CurationReport, CurationFailure> {
        ensure_metrics_described();
        counter!("curate_runs_total").increment(1);
        let t0 = Instant::now();

        let mut run = PipelineRun::start(raw.len());
        let mut issues: Vec<CurationIssue> = Vec::new();

        // Collecting: normalize, skipping malformed items.
        let mut trends = Vec::with_capacity(raw.len());
        for item in &raw {
            match normalize::normalize(item, now) {
                Ok(t) => trends.push(t),
                Err(reason) => {
                    tracing::debug!(target: "normalize", source = %item.source_name, %reason, "skipping malformed item");
                    issues.push(CurationIssue::MalformedItem {
                        source_name: item.source_name.clone(),
                        reason,
                    });
                }
            }
        }
        run.counts.normalized = trends.len();
        let malformed = run.counts.raw - run.counts.normalized;
        if malformed > 0 {
            counter!("curate_malformed_total").increment(malformed as u64);
        }
        tracing::info!(target: "normalize", raw = run.counts.raw, normalized = run.counts.normalized, "normalized");

        run.advance();
        let deduped = self.dedup.dedup(trends);
        counter!("curate_dedup_removed_total").increment(deduped.removed as u64);
        let mut trends = deduped.trends;
        run.counts.deduplicated = trends.len();
        if trends.is_empty() {
            tracing::warn!(target: "curate", "no trends left after deduplication");
            issues.push(CurationIssue::EmptyAfterDedup);
        }

        run.advance();
        self.categorizer.categorize(&mut trends);
        run.counts.categorized = trends.len();
        if trends.is_empty() {
            tracing::warn!(target: "curate", "no trends left after categorization");
            issues.push(CurationIssue::EmptyAfterCategorization);
        }

        run.advance();
        self.scorer.score_all(&mut trends, now);
        run.counts.scored = trends.len();
        if trends.is_empty() {
            return Err(self.fail(&mut run, FailureReason::PipelineExhausted, issues));
        }
        let fallback = self.categorizer.fallback();
        let (ranked, truncated) = scoring::rank_and_truncate(trends, &self.config.ranking, fallback);
        counter!("curate_truncated_total").increment(truncated as u64);
        run.counts.ranked = ranked.len();

        run.advance();
        let outcome = self.gate.validate(ranked.into_trends(), now).await;
        counter!("curate_rejected_total").increment(outcome.rejected.len() as u64);
        counter!("curate_fail_open_total").increment(outcome.issues.len() as u64);
        counter!("curate_corrections_total").increment(outcome.corrections.len() as u64);
        issues.extend(outcome.issues);
        // Corrections may move trends between categories, so rank and cap again.
        let (collection, recapped) = scoring::rank_and_truncate(outcome.kept, &self.config.ranking, fallback);
        if recapped > 0 {
            tracing::info!(target: "curate", recapped, "corrections overfilled categories, dropped lowest ranked");
            counter!("curate_truncated_total").increment(recapped as u64);
        }
        run.counts.validated = collection.len();

        if let Err(detail) = collection.check_invariants() {
            tracing::error!(target: "curate", %detail, "output invariant violated");
            return Err(self.fail(&mut run, FailureReason::InvariantViolated(detail), issues));
        }
        run.advance();

        let quality = QualityReport::assess(&collection, &self.config.quality, now);
        if !quality.passed() {
            let detail = format!(
                "{} trends (min {}), fresh ratio {:.2} (min {:.2})",
                quality.total,
                self.config.quality.min_trends,
                quality.fresh_ratio,
                self.config.quality.min_fresh_ratio
            );
            tracing::warn!(target: "curate", %detail, "quality below target");
            issues.push(CurationIssue::QualityBelowTarget { detail });
        }

        let keywords = keywords::global_keywords(collection.iter(), keywords::MAX_GLOBAL_KEYWORDS);

        histogram!("curate_run_ms").record(t0.elapsed().as_secs_f64() * 1000.0);
        gauge!("curate_last_run_trends").set(collection.len() as f64);
        gauge!("curate_last_run_ts").set(now.timestamp() as f64);
        tracing::info!(
            target: "curate",
            stage = ?run.stage(),
            counts = %run.counts,
            issues = issues.len(),
            judge = self.gate.judge_name(),
            "curation done"
        );

        Ok(CurationReport {
            collection,
            counts: run.counts,
            issues,
            rejected: outcome.rejected,
            corrections: outcome.corrections,
            keywords,
            quality,
            recapped,
        })
    }

    fn fail(
        &self,
        run: &mut PipelineRun,
        reason: FailureReason,
        issues: Vec<CurationIssue>,
    ) -> CurationFailure {
        let failed_at = run.fail();
        counter!("curate_failures_total").increment(1);
        tracing::error!(target: "curate", stage = ?failed_at, counts = %run.counts, %reason, "curation failed");
        CurationFailure {
            failed_at,
            reason,
            counts: run.counts,
            issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trend::{Category, SourceKind};
    use crate::validator::AcceptAll;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn raw(title: &str, url: &str) -> RawItem {
        RawItem {
            title: title.into(),
            summary: Some("summary".into()),
            url: Some(url.into()),
            published_at: Some(now() - Duration::hours(2)),
            source_name: "fedscoop".into(),
            source_kind: SourceKind::Feed,
        }
    }

    fn curator() -> Curator {
        Curator::new(CurationConfig::default(), Arc::new(AcceptAll)).unwrap()
    }

    #[tokio::test]
    async fn happy_path_reaches_done_with_counts() {
        let report = curator()
            .curate(
                vec![
                    raw("CMMC final rule published", "https://a.test/1"),
                    raw("Pentagon awards cloud deal", "https://a.test/2"),
                    raw("", "https://a.test/3"),
                ],
                now(),
            )
            .await
            .unwrap();
        assert_eq!(report.counts.raw, 3);
        assert_eq!(report.counts.normalized, 2);
        assert_eq!(report.counts.validated, 2);
        assert_eq!(report.collection.get(Category::CmmcProgram).len(), 1);
        assert_eq!(report.collection.get(Category::DefenseIndustrialBase).len(), 1);
        assert!(matches!(
            report.issues[0],
            CurationIssue::MalformedItem {
                reason: MalformedItem::MissingTitle,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn all_malformed_fails_at_scoring() {
        let err = curator()
            .curate(vec![raw("  ", "https://a.test/1")], now())
            .await
            .unwrap_err();
        assert_eq!(err.failed_at, Stage::Scoring);
        assert_eq!(err.reason, FailureReason::PipelineExhausted);
        assert_eq!(err.counts.raw, 1);
        assert_eq!(err.counts.normalized, 0);
        assert!(err.issues.contains(&CurationIssue::EmptyAfterDedup));
    }

    #[test]
    fn quality_counts_fresh_share() {
        let q = QualityReport::assess(&TrendCollection::new(), &QualityConfig::default(), now());
        assert_eq!(q.total, 0);
        assert!(!q.passed());
    }
}
