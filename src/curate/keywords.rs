// src/curate/keywords.rs
//! Global keyword digest over the final collection's titles.

use crate::curate::text::STOP_WORDS;
use crate::trend::Trend;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::HashMap;

pub const MAX_GLOBAL_KEYWORDS: usize = 100;

fn re_word() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\b[a-z]{4,}\b").unwrap())
}

/// Most frequent title words (4+ ASCII letters, stop words excluded).
/// Ordered by count descending, ties alphabetical.
pub fn global_keywords<'a>(trends: impl IntoIterator<Item = &'a Trend>, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for t in trends {
        let lower = t.title.to_lowercase();
        for m in re_word().find_iter(&lower) {
            let w = m.as_str();
            if STOP_WORDS.contains(&w) {
                continue;
            }
            *counts.entry(w.to_string()).or_insert(0) += 1;
        }
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(w, _)| w).collect()
}
