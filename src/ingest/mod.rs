// src/ingest/mod.rs
//! Source adapters: fetch raw items from the outside world.
//!
//! Adapters run concurrently. A failing adapter is logged and counted but never
//! fails collection; the curation pipeline sorts canonically, so the order in
//! which adapters finish does not matter.

pub mod config;
pub mod rss;

use crate::trend::RawItem;
use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

pub use rss::RssAdapter;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Raw items returned by adapters.");
        describe_counter!("ingest_adapter_errors_total", "Adapter fetch/parse errors.");
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!("ingest_last_run_ts", "Unix ts when collection last ran.");
    });
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RawItem>>;
    fn name(&self) -> &str;
}

#[derive(Debug, Default)]
pub struct Collected {
    pub items: Vec<RawItem>,
    /// Names of adapters that errored.
    pub failed: Vec<String>,
}

/// Run every adapter concurrently and pool what they return.
pub async fn collect_all(adapters: &[Box<dyn SourceAdapter>]) -> Collected {
    ensure_metrics_described();

    let results = join_all(adapters.iter().map(|a| a.fetch())).await;

    let mut out = Collected::default();
    for (adapter, result) in adapters.iter().zip(results) {
        match result {
            Ok(mut items) => {
                tracing::debug!(target: "ingest", adapter = adapter.name(), items = items.len(), "adapter done");
                out.items.append(&mut items);
            }
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, adapter = adapter.name(), "adapter error");
                counter!("ingest_adapter_errors_total").increment(1);
                out.failed.push(adapter.name().to_string());
            }
        }
    }

    counter!("ingest_items_total").increment(out.items.len() as u64);
    gauge!("ingest_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
    tracing::info!(
        target: "ingest",
        adapters = adapters.len(),
        failed = out.failed.len(),
        items = out.items.len(),
        "collection finished"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trend::SourceKind;

    struct Fixed(&'static str, usize);
    struct Broken;

    #[async_trait]
    impl SourceAdapter for Fixed {
        async fn fetch(&self) -> Result<Vec<RawItem>> {
            Ok((0..self.1)
                .map(|i| RawItem {
                    title: format!("{} item {i}", self.0),
                    summary: None,
                    url: Some(format!("https://{}.test/{i}", self.0)),
                    published_at: None,
                    source_name: self.0.to_string(),
                    source_kind: SourceKind::Feed,
                })
                .collect())
        }
        fn name(&self) -> &str {
            self.0
        }
    }

    #[async_trait]
    impl SourceAdapter for Broken {
        async fn fetch(&self) -> Result<Vec<RawItem>> {
            anyhow::bail!("connection refused")
        }
        fn name(&self) -> &str {
            "broken"
        }
    }

    #[tokio::test]
    async fn failing_adapter_is_not_fatal() {
        let adapters: Vec<Box<dyn SourceAdapter>> =
            vec![Box::new(Fixed("a", 2)), Box::new(Broken), Box::new(Fixed("b", 1))];
        let c = collect_all(&adapters).await;
        assert_eq!(c.items.len(), 3);
        assert_eq!(c.failed, vec!["broken".to_string()]);
    }
}
