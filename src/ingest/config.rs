// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::CategoryConfig;
use crate::ingest::{RssAdapter, SourceAdapter};
use crate::trend::SourceKind;

const ENV_PATH: &str = "INGEST_FEEDS_PATH";
const DEFAULT_PATH: &str = "config/feeds.toml";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FeedSpec {
    pub name: String,
    pub url: String,
    #[serde(default = "default_kind")]
    pub kind: SourceKind,
    /// Keep only items mentioning a category keyword (for general news feeds).
    #[serde(default)]
    pub keyword_filter: bool,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FeedsConfig {
    #[serde(default)]
    pub feeds: Vec<FeedSpec>,
}

fn default_kind() -> SourceKind {
    SourceKind::Feed
}
fn default_max_items() -> usize {
    8
}

/// Load from an explicit path (TOML).
pub fn load_feeds_from(path: &Path) -> Result<FeedsConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading feeds from {}", path.display()))?;
    parse_feeds(&content)
}

/// 1) $INGEST_FEEDS_PATH
/// 2) config/feeds.toml
/// 3) built-in seed list
pub fn load_feeds_default() -> Result<FeedsConfig> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_feeds_from(&pb);
        } else {
            return Err(anyhow!("INGEST_FEEDS_PATH points to non-existent path"));
        }
    }
    let p = PathBuf::from(DEFAULT_PATH);
    if p.exists() {
        return load_feeds_from(&p);
    }
    Ok(seed_feeds())
}

pub fn parse_feeds(s: &str) -> Result<FeedsConfig> {
    let mut cfg: FeedsConfig = toml::from_str(s)?;
    cfg.feeds.retain(|f| !f.name.trim().is_empty() && !f.url.trim().is_empty());
    for f in &mut cfg.feeds {
        f.name = f.name.trim().to_string();
        f.url = f.url.trim().to_string();
        f.max_items = f.max_items.max(1);
    }
    Ok(cfg)
}

fn seed_feeds() -> FeedsConfig {
    let domain = |name: &str, url: &str| FeedSpec {
        name: name.into(),
        url: url.into(),
        kind: SourceKind::Feed,
        keyword_filter: false,
        max_items: default_max_items(),
    };
    let general = |name: &str, url: &str| FeedSpec {
        keyword_filter: true,
        ..domain(name, url)
    };
    FeedsConfig {
        feeds: vec![
            domain("FedScoop", "https://fedscoop.com/feed/"),
            domain("DefenseScoop", "https://defensescoop.com/feed/"),
            domain("GovCon Wire", "https://www.govconwire.com/feed/"),
            domain("Cyber-AB News", "https://cyberab.org/feed/"),
            domain("NIST CSRC", "https://csrc.nist.gov/csrc/media/feeds/metafeeds/all.rss"),
            general("SecurityWeek", "https://www.securityweek.com/feed/"),
            general("Cyberscoop", "https://cyberscoop.com/feed/"),
            general("Breaking Defense", "https://breakingdefense.com/feed/"),
            general("Defense One", "https://www.defenseone.com/rss/all/"),
            general("IntelNews", "https://intelnews.org/feed/"),
        ],
    }
}

/// Build HTTP adapters. Filtered feeds match against every category keyword.
pub fn build_adapters(cfg: &FeedsConfig, categories: &CategoryConfig) -> Result<Vec<Box<dyn SourceAdapter>>> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("compliance-trends/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(20))
        .build()
        .context("building feed http client")?;
    let keywords: Vec<String> = categories
        .rules
        .iter()
        .flat_map(|r| r.keywords.iter().cloned())
        .collect();

    let mut out: Vec<Box<dyn SourceAdapter>> = Vec::with_capacity(cfg.feeds.len());
    for f in &cfg.feeds {
        let mut a = RssAdapter::from_url(&f.name, &f.url, client.clone())
            .with_kind(f.kind)
            .with_max_items(f.max_items);
        if f.keyword_filter {
            a = a.with_keyword_filter(&keywords)?;
        }
        out.push(Box::new(a));
    }
    Ok(out)
}
