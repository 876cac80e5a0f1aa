// tests/pipeline_e2e.rs
//
// Whole-pipeline runs through `Curator::curate`.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use compliance_trends::config::CurationConfig;
use compliance_trends::curate::{CurationIssue, FailOpenCause, FailureReason, Stage};
use compliance_trends::validator::{
    AcceptAll, JudgeRequest, JudgeResponse, RelevanceJudge, ValidatorError, Verdict,
};
use compliance_trends::{Category, Curator, RawItem, SourceKind};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

fn raw(title: &str, summary: &str, url: &str, source: &str, kind: SourceKind, age_h: i64) -> RawItem {
    RawItem {
        title: title.into(),
        summary: Some(summary.into()),
        url: Some(url.into()),
        published_at: Some(now() - Duration::hours(age_h)),
        source_name: source.into(),
        source_kind: kind,
    }
}

fn sample() -> Vec<RawItem> {
    use SourceKind::*;
    vec![
        raw("CMMC 2.0 certification requirements", "New CMMC certification process announced", "https://fedscoop.test/cmmc-req", "FedScoop", Feed, 2),
        raw("CMMC 2.0 final rule published", "The rule takes effect in December.", "https://govcon.test/rule", "GovCon Wire", Feed, 5),
        raw("Final rule for CMMC 2.0 published today", "", "https://reddit.test/r/cmmc/1", "r/CMMC", Forum, 1),
        raw("NIST 800-171 update released", "DFARS compliance requirements", "https://nist.test/171", "NIST CSRC", Feed, 20),
        raw("Chinese APT group targets defense contractors", "Nation-state espionage campaign discovered", "https://cyberscoop.test/apt", "Cyberscoop", Feed, 8),
        raw("Employee arrested for data exfiltration", "Insider threat case at defense contractor", "https://doj.test/insider", "DOJ", Feed, 30),
        raw("Pentagon awards cloud deal", "Multi-year award announced", "https://defenseone.test/cloud", "Defense One", Feed, 12),
        raw("Pentagon awards cloud deal", "Same story, syndicated", "https://defenseone.test/cloud/", "Defense One Mirror", Feed, 11),
        raw("Quarterly budget hearing scheduled", "Agency leadership testifies", "https://agency.test/budget", "ExecutiveGov", Feed, 3),
        raw("Mentorship Monday: ask your CMMC questions", "Weekly thread", "https://reddit.test/r/cmmc/2", "r/CMMC", Forum, 4),
        raw("   ", "no title here", "https://broken.test/1", "Broken Feed", Feed, 1),
        raw("Title without link or body", "", "", "Broken Feed", Feed, 1),
    ]
}

fn curator() -> Curator {
    Curator::new(CurationConfig::default(), Arc::new(AcceptAll)).unwrap()
}

#[tokio::test]
async fn full_run_categorizes_dedups_and_reports() {
    let report = curator().curate(sample(), now()).await.unwrap();

    assert_eq!(report.counts.raw, 12);
    assert_eq!(report.counts.normalized, 10);
    // CMMC 2.0 rule pair and the mirrored Pentagon story collapse
    assert_eq!(report.counts.deduplicated, 8);
    assert_eq!(report.counts.validated, 7);

    let c = &report.collection;
    assert_eq!(c.get(Category::CmmcProgram).len(), 2);
    assert_eq!(c.get(Category::NistCompliance).len(), 1);
    assert_eq!(c.get(Category::IntelligenceThreats).len(), 1);
    assert_eq!(c.get(Category::InsiderThreats).len(), 1);
    assert_eq!(c.get(Category::DefenseIndustrialBase).len(), 1);
    // no keyword → fallback bucket, never dropped
    assert_eq!(c.get(Category::FederalCybersecurity)[0].title, "Quarterly budget hearing scheduled");

    // merged representative got the cluster's longest summary
    let rule = c
        .get(Category::CmmcProgram)
        .iter()
        .find(|t| t.source_name == "r/CMMC")
        .expect("forum representative");
    assert_eq!(rule.summary, "The rule takes effect in December.");

    assert_eq!(report.rejected.len(), 1);
    assert!(report.rejected[0].title.starts_with("Mentorship Monday"));

    let malformed = report
        .issues
        .iter()
        .filter(|i| matches!(i, CurationIssue::MalformedItem { .. }))
        .count();
    assert_eq!(malformed, 2);
    assert!(report.keywords.contains(&"cmmc".to_string()));
    assert!(c.check_invariants().is_ok());
}

#[tokio::test]
async fn curation_can_run_on_a_spawned_task() {
    let cur = Arc::new(curator());
    let report = tokio::spawn({
        let cur = cur.clone();
        async move { cur.curate(sample(), now()).await }
    })
    .await
    .unwrap()
    .unwrap();
    assert_eq!(report.counts.validated, 7);
}

#[tokio::test]
async fn same_input_same_now_gives_byte_identical_output() {
    let cur = curator();
    let a = serde_json::to_string(&cur.curate(sample(), now()).await.unwrap()).unwrap();
    let b = serde_json::to_string(&cur.curate(sample(), now()).await.unwrap()).unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn collection_is_independent_of_arrival_order() {
    let cur = curator();
    let expected = serde_json::to_string(&cur.curate(sample(), now()).await.unwrap().collection).unwrap();

    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..8 {
        let mut items = sample();
        items.shuffle(&mut rng);
        let got = serde_json::to_string(&cur.curate(items, now()).await.unwrap().collection).unwrap();
        assert_eq!(got, expected);
    }
}

#[tokio::test]
async fn output_is_ranked_and_capped_per_category() {
    let mut cfg = CurationConfig::default();
    cfg.ranking.per_category_cap = 5;
    let cur = Curator::new(cfg, Arc::new(AcceptAll)).unwrap();

    let words = ["alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel", "india", "juliet"];
    let items: Vec<RawItem> = words
        .iter()
        .enumerate()
        .map(|(i, w)| {
            raw(
                &format!("CMMC {w} briefing"),
                "",
                &format!("https://x.test/{w}"),
                "FedScoop",
                SourceKind::Feed,
                i as i64 * 4,
            )
        })
        .collect();

    let report = cur.curate(items, now()).await.unwrap();
    assert_eq!(report.counts.scored, 10);
    assert_eq!(report.counts.ranked, 5);
    let kept = report.collection.get(Category::CmmcProgram);
    let titles: Vec<&str> = kept.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["CMMC alpha briefing", "CMMC bravo briefing", "CMMC charlie briefing", "CMMC delta briefing", "CMMC echo briefing"]
    );
    assert!(kept.windows(2).all(|w| w[0].score > w[1].score));
}

struct Hanging;

#[async_trait]
impl RelevanceJudge for Hanging {
    async fn judge(&self, _batch: &[JudgeRequest]) -> Result<JudgeResponse, ValidatorError> {
        tokio::time::sleep(StdDuration::from_secs(5)).await;
        Ok(JudgeResponse::default())
    }
    fn name(&self) -> &'static str {
        "hanging"
    }
}

#[tokio::test]
async fn validator_timeout_keeps_every_trend_and_records_it() {
    let mut cfg = CurationConfig::default();
    cfg.validator.timeout_ms = 25;
    let cur = Curator::new(cfg, Arc::new(Hanging)).unwrap();

    let report = cur.curate(sample(), now()).await.unwrap();
    // everything except the pre-filtered junk is still there
    assert_eq!(report.counts.validated, 7);
    assert_eq!(report.fail_open_events(), 1);
    assert!(report.issues.iter().any(|i| matches!(
        i,
        CurationIssue::ValidatorUnavailable {
            cause: FailOpenCause::Timeout,
            ..
        }
    )));
}

#[tokio::test]
async fn nothing_valid_fails_with_stage_counts() {
    let items = vec![
        raw("", "only a summary", "https://x.test/1", "A", SourceKind::Feed, 1),
        raw("No url or summary", "", "", "B", SourceKind::Feed, 1),
    ];
    let failure = curator().curate(items, now()).await.unwrap_err();

    assert_eq!(failure.failed_at, Stage::Scoring);
    assert_eq!(failure.reason, FailureReason::PipelineExhausted);
    assert_eq!(failure.counts.raw, 2);
    assert_eq!(failure.counts.normalized, 0);
    assert_eq!(failure.counts.scored, 0);
    assert!(failure.issues.contains(&CurationIssue::EmptyAfterDedup));
    assert!(failure.issues.contains(&CurationIssue::EmptyAfterCategorization));

    let json = serde_json::to_value(&failure).unwrap();
    assert_eq!(json["failed_at"], "scoring");
    assert_eq!(json["counts"]["raw"], 2);
}

#[tokio::test]
async fn empty_after_validation_still_completes() {
    let items = vec![raw(
        "Weekly discussion thread",
        "",
        "https://reddit.test/w",
        "r/CMMC",
        SourceKind::Forum,
        1,
    )];
    let report = curator().curate(items, now()).await.unwrap();
    assert!(report.collection.is_empty());
    assert_eq!(report.rejected.len(), 1);
    assert!(report
        .issues
        .iter()
        .any(|i| matches!(i, CurationIssue::QualityBelowTarget { .. })));
}

/// Moves every Pentagon story into the CMMC bucket.
struct PentagonIsCmmc;

#[async_trait]
impl RelevanceJudge for PentagonIsCmmc {
    async fn judge(&self, batch: &[JudgeRequest]) -> Result<JudgeResponse, ValidatorError> {
        let verdicts = batch
            .iter()
            .map(|r| {
                let category = r.title.contains("Pentagon").then_some(Category::CmmcProgram);
                (
                    r.id.clone(),
                    Verdict {
                        relevant: true,
                        category,
                        reason: None,
                    },
                )
            })
            .collect();
        Ok(JudgeResponse { verdicts })
    }
    fn name(&self) -> &'static str {
        "pentagon_is_cmmc"
    }
}

#[tokio::test]
async fn corrections_into_a_full_category_are_recapped_and_counted() {
    let mut cfg = CurationConfig::default();
    cfg.ranking.per_category_cap = 1;
    let cur = Curator::new(cfg, Arc::new(PentagonIsCmmc)).unwrap();

    let items = vec![
        raw("CMMC assessment guide updated", "", "https://x.test/cmmc", "FedScoop", SourceKind::Feed, 1),
        raw("Pentagon awards cloud deal", "Multi-year award", "https://x.test/dib", "Defense One", SourceKind::Feed, 6),
    ];
    let report = cur.curate(items, now()).await.unwrap();

    assert_eq!(report.counts.ranked, 2);
    assert_eq!(report.corrections.len(), 1);
    assert_eq!(report.recapped, 1);
    assert_eq!(report.counts.validated, 1);
    let cmmc = report.collection.get(Category::CmmcProgram);
    assert_eq!(cmmc.len(), 1);
    assert_eq!(cmmc[0].title, "CMMC assessment guide updated");
    assert!(report.collection.get(Category::DefenseIndustrialBase).is_empty());
}
