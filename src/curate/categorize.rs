// src/curate/categorize.rs
//! Rule-list categorization: (category, keyword set) pairs tried in priority
//! order against title + summary. First match wins; no match → fallback.
//! Categorization never drops a trend.

use crate::config::CategoryConfig;
use crate::curate::text::keyword_set_regex;
use crate::trend::{Category, Trend};
use anyhow::Context;
use regex::Regex;

#[derive(Debug)]
struct CompiledRule {
    category: Category,
    re: Regex,
}

#[derive(Debug)]
pub struct Categorizer {
    rules: Vec<CompiledRule>,
    fallback: Category,
}

impl Categorizer {
    pub fn from_config(cfg: &CategoryConfig) -> anyhow::Result<Self> {
        let mut rules = Vec::with_capacity(cfg.rules.len());
        for rule in &cfg.rules {
            let re = keyword_set_regex(&rule.keywords)
                .with_context(|| format!("category `{}` keyword regex", rule.category))?;
            // A rule without keywords can never match; skip it.
            if let Some(re) = re {
                rules.push(CompiledRule {
                    category: rule.category,
                    re,
                });
            }
        }
        Ok(Self {
            rules,
            fallback: cfg.fallback,
        })
    }

    pub fn fallback(&self) -> Category {
        self.fallback
    }

    /// Category for a title/summary pair.
    pub fn classify(&self, title: &str, summary: &str) -> Category {
        self.rules
            .iter()
            .find(|r| r.re.is_match(title) || r.re.is_match(summary))
            .map(|r| r.category)
            .unwrap_or(self.fallback)
    }

    /// Assign a category to every trend in place. Returns how many fell back.
    pub fn categorize(&self, trends: &mut [Trend]) -> usize {
        let mut fell_back = 0usize;
        for t in trends.iter_mut() {
            let cat = self.classify(&t.title, &t.summary);
            if cat == self.fallback {
                fell_back += 1;
            }
            t.category = Some(cat);
        }
        tracing::info!(target: "categorize", total = trends.len(), fell_back, "categorized");
        fell_back
    }
}
