// src/trend.rs
//! Canonical records flowing through the curation pipeline.
//!
//! `RawItem` is what source adapters hand over; `Trend` is the normalized record;
//! `TrendCollection` is the per-category ranked output consumed by rendering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Kind of origin, distinct from the topic category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Feed,
    Forum,
    Social,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Feed => "feed",
            SourceKind::Forum => "forum",
            SourceKind::Social => "social",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed topic buckets. Declaration order is the default priority order and
/// also the order categories appear in a `TrendCollection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    CmmcProgram,
    NistCompliance,
    IntelligenceThreats,
    InsiderThreats,
    DefenseIndustrialBase,
    FederalCybersecurity,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::CmmcProgram,
        Category::NistCompliance,
        Category::IntelligenceThreats,
        Category::InsiderThreats,
        Category::DefenseIndustrialBase,
        Category::FederalCybersecurity,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::CmmcProgram => "cmmc_program",
            Category::NistCompliance => "nist_compliance",
            Category::IntelligenceThreats => "intelligence_threats",
            Category::InsiderThreats => "insider_threats",
            Category::DefenseIndustrialBase => "defense_industrial_base",
            Category::FederalCybersecurity => "federal_cybersecurity",
        }
    }

    /// Lenient label resolution for labels coming back from an external judge:
    /// exact → folded (case, spaces, dashes) → closest by Jaro-Winkler (>= 0.9).
    pub fn resolve_label(raw: &str) -> Option<Category> {
        let folded: String = raw
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();
        if folded.is_empty() {
            return None;
        }
        if let Some(c) = Category::ALL.iter().find(|c| c.label() == folded) {
            return Some(*c);
        }

        let mut best: Option<(f64, Category)> = None;
        for c in Category::ALL {
            let sim = strsim::jaro_winkler(&folded, c.label());
            if sim >= 0.9 && best.map(|(s, _)| sim > s).unwrap_or(true) {
                best = Some((sim, c));
            }
        }
        best.map(|(_, c)| c)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .find(|c| c.label() == s.trim())
            .copied()
            .ok_or_else(|| anyhow::anyhow!("unknown category `{s}`"))
    }
}

/// One item as produced by a source adapter, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    pub source_name: String,
    pub source_kind: SourceKind,
}

/// Canonical normalized record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub url: String,
    pub source_name: String,
    pub source_kind: SourceKind,
    pub published_at: DateTime<Utc>,
    pub category: Option<Category>,
    pub score: Option<f64>,
    pub image_url: Option<String>,
}

impl Trend {
    /// Score as used for ordering; unscored trends sort last.
    pub fn score_or_zero(&self) -> f64 {
        self.score.unwrap_or(0.0)
    }

    /// Lowercased "title summary" blob used by keyword rules.
    pub fn content_lower(&self) -> String {
        format!("{} {}", self.title, self.summary).to_lowercase()
    }
}

/// Ordered-by-category output. Each sequence is highest score first and capped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendCollection {
    categories: BTreeMap<Category, Vec<Trend>>,
}

impl TrendCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_map(categories: BTreeMap<Category, Vec<Trend>>) -> Self {
        Self { categories }
    }

    pub fn get(&self, category: Category) -> &[Trend] {
        self.categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn categories(&self) -> impl Iterator<Item = (Category, &[Trend])> {
        self.categories.iter().map(|(c, v)| (*c, v.as_slice()))
    }

    /// All trends, category priority order then rank order.
    pub fn iter(&self) -> impl Iterator<Item = &Trend> {
        self.categories.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_trends(self) -> Vec<Trend> {
        self.categories.into_values().flatten().collect()
    }

    /// Check the output invariants: every trend categorized under its own bucket,
    /// finite non-negative score, no id collisions.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut ids = HashSet::new();
        for (cat, trends) in &self.categories {
            for t in trends {
                if t.category != Some(*cat) {
                    return Err(format!("trend {} filed under {cat} but has {:?}", t.id, t.category));
                }
                match t.score {
                    Some(s) if s.is_finite() && s >= 0.0 => {}
                    other => return Err(format!("trend {} has invalid score {other:?}", t.id)),
                }
                if !ids.insert(t.id.as_str()) {
                    return Err(format!("duplicate trend id {}", t.id));
                }
            }
        }
        Ok(())
    }
}
