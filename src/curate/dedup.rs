// src/curate/dedup.rs
//! Cross-source deduplication.
//!
//! Two trends are duplicates when their canonical urls match, when they share an
//! id, or when their significant title tokens reach the Jaccard threshold.
//! Clustering is transitive (union-find). Title comparison only happens inside
//! buckets keyed by each item's rarest tokens among those seen in at least two
//! titles, so near-duplicates whose shared rare tokens differ can be missed.
//! That is an accepted approximation.
//!
//! Output never depends on input order: items are put in a canonical order first
//! and every tie-break ends on the id.

use crate::config::DedupConfig;
use crate::curate::text::{title_tokens, STOP_WORDS};
use crate::trend::Trend;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    pub trends: Vec<Trend>,
    /// Clusters with more than one member.
    pub clusters: usize,
    pub removed: usize,
}

#[derive(Debug, Clone)]
pub struct Deduplicator {
    threshold: f64,
    signature_tokens: usize,
    stop_words: HashSet<String>,
}

impl Deduplicator {
    pub fn from_config(cfg: &DedupConfig) -> Self {
        let stop_words = match &cfg.stop_words {
            Some(list) => list.iter().map(|w| w.trim().to_lowercase()).collect(),
            None => STOP_WORDS.iter().map(|w| w.to_string()).collect(),
        };
        Self {
            threshold: cfg.similarity_threshold,
            signature_tokens: cfg.signature_tokens.max(1),
            stop_words,
        }
    }

    /// Case-folded title tokens minus stop words.
    pub fn significant_tokens(&self, title: &str) -> BTreeSet<String> {
        title_tokens(title)
            .into_iter()
            .filter(|t| !self.stop_words.contains(t))
            .collect()
    }

    pub fn is_near_duplicate(&self, a: &str, b: &str) -> bool {
        jaccard(&self.significant_tokens(a), &self.significant_tokens(b)) >= self.threshold
    }

    pub fn dedup(&self, mut trends: Vec<Trend>) -> DedupOutcome {
        let total = trends.len();
        if total == 0 {
            return DedupOutcome::default();
        }
        trends.sort_by(canonical_order);

        let mut uf = UnionFind::new(total);

        // (1) shared id, (2) shared canonical url
        let mut by_id: HashMap<&str, usize> = HashMap::new();
        let mut by_url: HashMap<String, usize> = HashMap::new();
        for (i, t) in trends.iter().enumerate() {
            if let Some(&j) = by_id.get(t.id.as_str()) {
                uf.union(i, j);
            } else {
                by_id.insert(t.id.as_str(), i);
            }
            if let Some(key) = url_key(&t.url) {
                match by_url.get(&key) {
                    Some(&j) => uf.union(i, j),
                    None => {
                        by_url.insert(key, i);
                    }
                }
            }
        }

        // (3) title similarity within rare-token buckets
        let tokens: Vec<BTreeSet<String>> = trends
            .iter()
            .map(|t| self.significant_tokens(&t.title))
            .collect();
        let mut df: HashMap<&str, usize> = HashMap::new();
        for set in &tokens {
            for tok in set {
                *df.entry(tok.as_str()).or_insert(0) += 1;
            }
        }
        let mut buckets: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, set) in tokens.iter().enumerate() {
            // A token only this item carries can never pair it with anything.
            let mut ranked: Vec<&str> = set
                .iter()
                .map(String::as_str)
                .filter(|tok| df[tok] >= 2)
                .collect();
            ranked.sort_by(|a, b| df[a].cmp(&df[b]).then_with(|| a.cmp(b)));
            for key in ranked.into_iter().take(self.signature_tokens) {
                buckets.entry(key).or_default().push(i);
            }
        }
        for members in buckets.values() {
            for (pos, &i) in members.iter().enumerate() {
                for &j in &members[pos + 1..] {
                    if uf.find(i) == uf.find(j) {
                        continue;
                    }
                    if jaccard(&tokens[i], &tokens[j]) >= self.threshold {
                        tracing::debug!(
                            target: "dedup",
                            a = %trends[i].id,
                            b = %trends[j].id,
                            "near-duplicate titles"
                        );
                        uf.union(i, j);
                    }
                }
            }
        }

        // Collect clusters and pick representatives.
        let mut clusters: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for i in 0..total {
            clusters.entry(uf.find(i)).or_default().push(i);
        }

        let mut multi = 0usize;
        let mut out = Vec::with_capacity(clusters.len());
        for members in clusters.values() {
            if members.len() > 1 {
                multi += 1;
            }
            let rep_idx = members
                .iter()
                .copied()
                .max_by(|&a, &b| representative_order(&trends[a], &trends[b]).then(b.cmp(&a)))
                .unwrap_or(members[0]);
            let mut rep = trends[rep_idx].clone();

            if rep.summary.is_empty() {
                if let Some(longest) = members
                    .iter()
                    .map(|&i| &trends[i].summary)
                    .filter(|s| !s.is_empty())
                    .max_by(|a, b| {
                        a.chars()
                            .count()
                            .cmp(&b.chars().count())
                            .then_with(|| b.cmp(a))
                    })
                {
                    rep.summary = longest.clone();
                }
            }
            out.push(rep);
        }
        out.sort_by(canonical_order);

        let removed = total - out.len();
        tracing::info!(target: "dedup", kept = out.len(), removed, clusters = multi, "deduplicated");
        DedupOutcome {
            trends: out,
            clusters: multi,
            removed,
        }
    }
}

/// Greater = better representative: newest, then longer summary, then smaller id.
fn representative_order(a: &Trend, b: &Trend) -> Ordering {
    a.published_at
        .cmp(&b.published_at)
        .then_with(|| a.summary.chars().count().cmp(&b.summary.chars().count()))
        .then_with(|| b.id.cmp(&a.id))
}

/// Total order over every field that can differ, so sorting is input-order independent.
fn canonical_order(a: &Trend, b: &Trend) -> Ordering {
    a.id.cmp(&b.id)
        .then_with(|| a.url.cmp(&b.url))
        .then_with(|| a.source_name.cmp(&b.source_name))
        .then_with(|| a.published_at.cmp(&b.published_at))
        .then_with(|| a.summary.cmp(&b.summary))
        .then_with(|| a.title.cmp(&b.title))
}

/// Canonical url: no fragment, no query, no trailing slashes, case-folded scheme and host.
pub fn url_key(url: &str) -> Option<String> {
    let u = url.trim();
    let u = u.split('#').next().unwrap_or_default();
    let u = u.split('?').next().unwrap_or_default();
    let u = u.trim_end_matches('/');
    if u.is_empty() {
        return None;
    }
    let key = match u.find("://") {
        Some(pos) => {
            let rest = &u[pos + 3..];
            let (host, path) = match rest.find('/') {
                Some(slash) => rest.split_at(slash),
                None => (rest, ""),
            };
            format!("{}://{}{}", u[..pos].to_ascii_lowercase(), host.to_ascii_lowercase(), path)
        }
        None => u.to_string(),
    };
    Some(key)
}

pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count();
    let union = a.len() + b.len() - inter;
    inter as f64 / union as f64
}

/// Disjoint sets with path halving; the smaller index becomes the root so
/// cluster keys stay deterministic.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}
