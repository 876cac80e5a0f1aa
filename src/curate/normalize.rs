// src/curate/normalize.rs
//! Raw item → `Trend`. Pure transform, no side effects.

use crate::curate::error::MalformedItem;
use crate::curate::text::{clean_text, fold_title};
use crate::trend::{RawItem, SourceKind, Trend};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_SUMMARY_CHARS: usize = 500;

/// Stable id: hash of the folded title and the source kind.
/// Same title from the same kind of source collides on purpose.
pub fn trend_id(title: &str, kind: SourceKind) -> String {
    let mut hasher = Sha256::new();
    hasher.update(fold_title(title).as_bytes());
    hasher.update(b"|");
    hasher.update(kind.as_str().as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Normalize one raw item collected at `now`.
pub fn normalize(item: &RawItem, now: DateTime<Utc>) -> Result<Trend, MalformedItem> {
    let title = clean_text(&item.title, MAX_TITLE_CHARS);
    if title.is_empty() {
        return Err(MalformedItem::MissingTitle);
    }

    let summary = item
        .summary
        .as_deref()
        .map(|s| clean_text(s, MAX_SUMMARY_CHARS))
        .unwrap_or_default();
    let url = item
        .url
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if url.is_empty() && summary.is_empty() {
        return Err(MalformedItem::MissingUrlAndSummary);
    }

    // Never later than collection time.
    let published_at = item.published_at.map(|t| t.min(now)).unwrap_or(now);

    Ok(Trend {
        id: trend_id(&title, item.source_kind),
        title,
        summary,
        url,
        source_name: item.source_name.trim().to_string(),
        source_kind: item.source_kind,
        published_at,
        category: None,
        score: None,
        image_url: None,
    })
}
