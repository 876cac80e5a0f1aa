// src/curate/scoring.rs
//! Relevance × recency scoring, then per-category ranking and truncation.
//!
//! score = keyword_weight × recency_decay
//! - keyword_weight: baseline + Σ configured keyword weights (title match counts
//!   with `title_multiplier`, otherwise a summary match with `summary_multiplier`),
//!   capped at `max_weight`. Zero matches still yield the baseline.
//! - recency_decay: max(floor, 1 / (1 + age_hours / half_life)).

use crate::config::{RankingConfig, ScoringConfig};
use crate::curate::text::keyword_pattern;
use crate::trend::{Category, Trend, TrendCollection};
use anyhow::Context;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug)]
struct ScoredKeyword {
    re: Regex,
    weight: f64,
}

#[derive(Debug)]
pub struct Scorer {
    keywords: Vec<ScoredKeyword>,
    baseline: f64,
    title_multiplier: f64,
    summary_multiplier: f64,
    max_weight: f64,
    half_life_hours: f64,
    floor: f64,
}

impl Scorer {
    pub fn from_config(cfg: &ScoringConfig) -> anyhow::Result<Self> {
        let mut keywords = Vec::with_capacity(cfg.keywords.len());
        for k in &cfg.keywords {
            let Some(p) = keyword_pattern(&k.term) else {
                continue;
            };
            let re = Regex::new(&format!("(?i){p}"))
                .with_context(|| format!("scoring keyword `{}`", k.term))?;
            keywords.push(ScoredKeyword {
                re,
                weight: k.weight,
            });
        }
        Ok(Self {
            keywords,
            baseline: cfg.baseline,
            title_multiplier: cfg.title_multiplier,
            summary_multiplier: cfg.summary_multiplier,
            max_weight: cfg.max_weight,
            half_life_hours: cfg.half_life_hours,
            floor: cfg.floor,
        })
    }

    pub fn keyword_weight(&self, title: &str, summary: &str) -> f64 {
        let mut w = self.baseline;
        for k in &self.keywords {
            if k.re.is_match(title) {
                w += k.weight * self.title_multiplier;
            } else if k.re.is_match(summary) {
                w += k.weight * self.summary_multiplier;
            }
        }
        w.min(self.max_weight)
    }

    pub fn recency_decay(&self, published_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let age_hours = (now - published_at).num_seconds().max(0) as f64 / 3600.0;
        (1.0 / (1.0 + age_hours / self.half_life_hours)).max(self.floor)
    }

    pub fn score(&self, trend: &Trend, now: DateTime<Utc>) -> f64 {
        let s = self.keyword_weight(&trend.title, &trend.summary)
            * self.recency_decay(trend.published_at, now);
        if s.is_finite() && s >= 0.0 {
            s
        } else {
            0.0
        }
    }

    /// Set `score` on every trend in place.
    pub fn score_all(&self, trends: &mut [Trend], now: DateTime<Utc>) {
        for t in trends.iter_mut() {
            t.score = Some(self.score(t, now));
        }
        tracing::info!(target: "score", total = trends.len(), "scored");
    }
}

/// Ranking order: higher score, then newer, then smaller id.
pub fn rank_order(a: &Trend, b: &Trend) -> Ordering {
    b.score_or_zero()
        .total_cmp(&a.score_or_zero())
        .then_with(|| b.published_at.cmp(&a.published_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Group by category, sort each bucket and keep the top `per_category_cap`.
/// Trends without a category are filed under `fallback`.
/// Returns the collection and how many trends were dropped by the cap.
pub fn rank_and_truncate(
    trends: Vec<Trend>,
    cfg: &RankingConfig,
    fallback: Category,
) -> (TrendCollection, usize) {
    let mut buckets: BTreeMap<Category, Vec<Trend>> = BTreeMap::new();
    for mut t in trends {
        let cat = *t.category.get_or_insert(fallback);
        buckets.entry(cat).or_default().push(t);
    }

    let mut dropped = 0usize;
    for (cat, list) in buckets.iter_mut() {
        list.sort_by(rank_order);
        if list.len() > cfg.per_category_cap {
            let overflow = list.len() - cfg.per_category_cap;
            tracing::debug!(target: "score", category = %cat, overflow, "truncating category");
            dropped += overflow;
            list.truncate(cfg.per_category_cap);
        }
    }
    (TrendCollection::from_map(buckets), dropped)
}
