// src/config/mod.rs
//! Curation pipeline configuration.
//!
//! One immutable `CurationConfig` is built at startup (TOML file or the built-in
//! domain seed) and handed to the `Curator`. Nothing in the pipeline reads
//! process-wide state after that.

pub mod ai;

use crate::trend::Category;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_CURATION_CONFIG_PATH: &str = "config/curation.toml";
pub const ENV_CURATION_CONFIG_PATH: &str = "CURATION_CONFIG_PATH";
pub const ENV_CATEGORY_CAP: &str = "CURATION_CATEGORY_CAP";

#[derive(Debug, Clone, Deserialize)]
pub struct CurationConfig {
    #[serde(default)]
    pub categories: CategoryConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
    #[serde(default)]
    pub quality: QualityConfig,
}

/* ----------------------------
Sections
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryConfig {
    /// Assigned when no rule matches.
    #[serde(default = "default_fallback")]
    pub fallback: Category,
    /// Evaluated in order; first match wins.
    #[serde(default = "default_rules")]
    pub rules: Vec<CategoryRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRule {
    pub category: Category,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DedupConfig {
    /// Jaccard similarity over significant title tokens at/above which two titles collide.
    #[serde(default = "default_similarity")]
    pub similarity_threshold: f64,
    /// How many rare tokens each item is bucketed under.
    #[serde(default = "default_signature_tokens")]
    pub signature_tokens: usize,
    /// Replaces the built-in stop-word list when present.
    #[serde(default)]
    pub stop_words: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_half_life")]
    pub half_life_hours: f64,
    /// Lower bound of the recency multiplier.
    #[serde(default = "default_floor")]
    pub floor: f64,
    /// Keyword weight of an item with no matches.
    #[serde(default = "default_baseline")]
    pub baseline: f64,
    #[serde(default = "default_title_multiplier")]
    pub title_multiplier: f64,
    #[serde(default = "default_summary_multiplier")]
    pub summary_multiplier: f64,
    #[serde(default = "default_max_weight")]
    pub max_weight: f64,
    #[serde(default = "default_score_keywords")]
    pub keywords: Vec<WeightedKeyword>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightedKeyword {
    pub term: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_cap")]
    pub per_category_cap: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_concurrency")]
    pub max_concurrent_batches: usize,
    #[serde(default = "default_true")]
    pub apply_corrections: bool,
    /// Source names never rejected by the gate (curated feeds).
    #[serde(default = "default_trusted_sources")]
    pub trusted_sources: Vec<String>,
    /// Regexes rejecting obvious junk before the external call.
    #[serde(default = "default_irrelevant_patterns")]
    pub irrelevant_patterns: Vec<String>,
    /// Reject items older than this before the external call. Disabled when absent.
    #[serde(default)]
    pub max_age_days: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QualityConfig {
    #[serde(default = "default_min_trends")]
    pub min_trends: usize,
    #[serde(default = "default_min_fresh_ratio")]
    pub min_fresh_ratio: f64,
    #[serde(default = "default_freshness_hours")]
    pub freshness_hours: f64,
}

/* ----------------------------
Defaults (domain seed)
---------------------------- */

fn default_fallback() -> Category {
    Category::FederalCybersecurity
}
fn default_similarity() -> f64 {
    0.6
}
fn default_signature_tokens() -> usize {
    2
}
fn default_half_life() -> f64 {
    48.0
}
fn default_floor() -> f64 {
    0.1
}
fn default_baseline() -> f64 {
    1.0
}
fn default_title_multiplier() -> f64 {
    1.0
}
fn default_summary_multiplier() -> f64 {
    0.5
}
fn default_max_weight() -> f64 {
    3.0
}
fn default_cap() -> usize {
    10
}
fn default_batch_size() -> usize {
    20
}
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_concurrency() -> usize {
    2
}
fn default_true() -> bool {
    true
}
fn default_min_trends() -> usize {
    5
}
fn default_min_fresh_ratio() -> f64 {
    0.5
}
fn default_freshness_hours() -> f64 {
    24.0
}

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

pub const CMMC_CORE_KEYWORDS: &[&str] = &[
    "cmmc",
    "c3pao",
    "cyber-ab",
    "cyberab",
    "cmmc 2.0",
    "cmmc level",
    "cmmc certification",
    "cmmc assessment",
    "cmmc compliance",
];

pub const NIST_KEYWORDS: &[&str] = &[
    "nist 800-171",
    "nist sp 800-171",
    "nist 800-172",
    "sp 800-172",
    "dfars",
    "dfars 252.204",
    "dfars 7012",
    "cui",
    "controlled unclassified",
    "fedramp",
    "fisma",
    "ato",
    "authority to operate",
];

pub const INTELLIGENCE_KEYWORDS: &[&str] = &[
    "espionage",
    "spy",
    "spying",
    "spied",
    "foreign agent",
    "foreign intelligence",
    "counterintelligence",
    "covert",
    "apt",
    "advanced persistent threat",
    "state-sponsored",
    "nation-state",
    "chinese hackers",
    "russian hackers",
    "north korean hackers",
    "iranian hackers",
    "lazarus group",
    "apt29",
    "apt28",
    "cozy bear",
    "fancy bear",
    "volt typhoon",
    "salt typhoon",
    "five eyes",
    "classified information",
    "treason",
];

pub const INSIDER_THREAT_KEYWORDS: &[&str] = &[
    "insider threat",
    "insider risk",
    "malicious insider",
    "trusted insider",
    "data exfiltration",
    "unauthorized disclosure",
    "dark web recruitment",
    "security clearance",
    "clearance revoked",
    "privilege abuse",
    "sabotage",
    "leaker",
    "credential theft",
    "remote worker fraud",
];

pub const DIB_KEYWORDS: &[&str] = &[
    "defense industrial base",
    "dib",
    "defense contractor",
    "dod contractor",
    "cleared contractor",
    "defense contract",
    "pentagon",
    "dod cybersecurity",
];

fn default_rules() -> Vec<CategoryRule> {
    vec![
        CategoryRule {
            category: Category::CmmcProgram,
            keywords: strings(CMMC_CORE_KEYWORDS),
        },
        CategoryRule {
            category: Category::NistCompliance,
            keywords: strings(NIST_KEYWORDS),
        },
        CategoryRule {
            category: Category::IntelligenceThreats,
            keywords: strings(INTELLIGENCE_KEYWORDS),
        },
        CategoryRule {
            category: Category::InsiderThreats,
            keywords: strings(INSIDER_THREAT_KEYWORDS),
        },
        CategoryRule {
            category: Category::DefenseIndustrialBase,
            keywords: strings(DIB_KEYWORDS),
        },
    ]
}

fn default_score_keywords() -> Vec<WeightedKeyword> {
    let core = CMMC_CORE_KEYWORDS.iter().map(|t| WeightedKeyword {
        term: t.to_string(),
        weight: 0.3,
    });
    let nist = NIST_KEYWORDS.iter().map(|t| WeightedKeyword {
        term: t.to_string(),
        weight: 0.2,
    });
    core.chain(nist).collect()
}

fn default_trusted_sources() -> Vec<String> {
    strings(&["linkedin"])
}

fn default_irrelevant_patterns() -> Vec<String> {
    strings(&[
        r"mentorship\s+monday",
        r"career\s+(question|advice)",
        r"looking\s+for\s+(job|work|position)",
        r"(hiring|job)\s+thread",
        r"certification\s+(training|advice|bootcamp)",
        r"^\[?megathread\]?",
        r"weekly\s+(discussion|thread)",
        r"daily\s+(discussion|thread)",
        r"^(leaving|quitting|my\s+experience)",
    ])
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            fallback: default_fallback(),
            rules: default_rules(),
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity(),
            signature_tokens: default_signature_tokens(),
            stop_words: None,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            half_life_hours: default_half_life(),
            floor: default_floor(),
            baseline: default_baseline(),
            title_multiplier: default_title_multiplier(),
            summary_multiplier: default_summary_multiplier(),
            max_weight: default_max_weight(),
            keywords: default_score_keywords(),
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            per_category_cap: default_cap(),
        }
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            timeout_ms: default_timeout_ms(),
            max_concurrent_batches: default_concurrency(),
            apply_corrections: true,
            trusted_sources: default_trusted_sources(),
            irrelevant_patterns: default_irrelevant_patterns(),
            max_age_days: None,
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_trends: default_min_trends(),
            min_fresh_ratio: default_min_fresh_ratio(),
            freshness_hours: default_freshness_hours(),
        }
    }
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            categories: CategoryConfig::default(),
            dedup: DedupConfig::default(),
            scoring: ScoringConfig::default(),
            ranking: RankingConfig::default(),
            validator: ValidatorConfig::default(),
            quality: QualityConfig::default(),
        }
    }
}

/* ----------------------------
Loading
---------------------------- */

impl CurationConfig {
    /// Load from `$CURATION_CONFIG_PATH` or `config/curation.toml`; falls back to the
    /// built-in seed when neither exists. `$CURATION_CATEGORY_CAP` overrides the cap.
    pub fn from_toml() -> Result<Self> {
        let explicit = std::env::var(ENV_CURATION_CONFIG_PATH).ok().map(PathBuf::from);
        let path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CURATION_CONFIG_PATH));

        let mut cfg = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("reading curation config at {}", path.display()))?;
            Self::from_toml_str(&content)
                .with_context(|| format!("parsing curation config at {}", path.display()))?
        } else if explicit.is_some() {
            anyhow::bail!("{ENV_CURATION_CONFIG_PATH} points to non-existent path");
        } else {
            Self::default()
        };

        if let Some(cap) = std::env::var(ENV_CATEGORY_CAP)
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok())
        {
            cfg.ranking.per_category_cap = cap;
        }

        Ok(cfg.validated())
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: CurationConfig = toml::from_str(s)?;
        Ok(cfg.validated())
    }

    /// Clamp nonsensical values back to something the pipeline can run with.
    pub fn validated(mut self) -> Self {
        let d = &mut self.dedup;
        if !d.similarity_threshold.is_finite() {
            d.similarity_threshold = default_similarity();
        }
        d.similarity_threshold = d.similarity_threshold.clamp(0.0, 1.0);
        d.signature_tokens = d.signature_tokens.max(1);

        let s = &mut self.scoring;
        if !(s.half_life_hours.is_finite() && s.half_life_hours > 0.0) {
            s.half_life_hours = default_half_life();
        }
        if !s.floor.is_finite() {
            s.floor = default_floor();
        }
        s.floor = s.floor.clamp(0.0, 1.0);
        if !(s.baseline.is_finite() && s.baseline > 0.0) {
            s.baseline = default_baseline();
        }
        if !(s.max_weight.is_finite() && s.max_weight >= s.baseline) {
            s.max_weight = s.baseline.max(default_max_weight());
        }
        for m in [&mut s.title_multiplier, &mut s.summary_multiplier] {
            if !(m.is_finite() && *m >= 0.0) {
                *m = 0.0;
            }
        }
        s.keywords.retain(|k| k.weight.is_finite() && k.weight >= 0.0);

        self.ranking.per_category_cap = self.ranking.per_category_cap.max(1);

        let v = &mut self.validator;
        v.batch_size = v.batch_size.max(1);
        v.max_concurrent_batches = v.max_concurrent_batches.max(1);
        v.timeout_ms = v.timeout_ms.max(1);

        let q = &mut self.quality;
        q.min_fresh_ratio = if q.min_fresh_ratio.is_finite() {
            q.min_fresh_ratio.clamp(0.0, 1.0)
        } else {
            default_min_fresh_ratio()
        };
        if !(q.freshness_hours.is_finite() && q.freshness_hours > 0.0) {
            q.freshness_hours = default_freshness_hours();
        }

        self
    }
}
