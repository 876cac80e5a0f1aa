// src/ingest/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::histogram;
use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;

use crate::curate::text::keyword_set_regex;
use crate::ingest::SourceAdapter;
use crate::trend::{RawItem, SourceKind};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

/// RFC 2822 first (RSS), RFC 3339 as a fallback for feeds that ignore the standard.
pub fn parse_pub_date(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    DateTime::parse_from_rfc2822(ts)
        .or_else(|_| DateTime::parse_from_rfc3339(ts))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

pub struct RssAdapter {
    name: String,
    kind: SourceKind,
    mode: Mode,
    /// General feeds only keep items mentioning a domain keyword.
    filter: Option<Regex>,
    max_items: Option<usize>,
}

impl RssAdapter {
    pub fn from_fixture(name: &str, xml: &str) -> Self {
        Self::with_mode(name, Mode::Fixture(xml.to_string()))
    }

    pub fn from_url(name: &str, url: &str, client: reqwest::Client) -> Self {
        Self::with_mode(
            name,
            Mode::Http {
                url: url.to_string(),
                client,
            },
        )
    }

    fn with_mode(name: &str, mode: Mode) -> Self {
        Self {
            name: name.to_string(),
            kind: SourceKind::Feed,
            mode,
            filter: None,
            max_items: None,
        }
    }

    pub fn with_kind(mut self, kind: SourceKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_keyword_filter(mut self, keywords: &[String]) -> Result<Self> {
        self.filter = keyword_set_regex(keywords).context("rss keyword filter")?;
        Ok(self)
    }

    pub fn with_max_items(mut self, n: usize) -> Self {
        self.max_items = Some(n);
        self
    }

    pub fn parse(&self, xml: &str) -> Result<Vec<RawItem>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(xml);
        let rss: Rss = from_str(&xml_clean)
            .with_context(|| format!("parsing rss xml from {}", self.name))?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let title = it.title.unwrap_or_default();
            if title.trim().is_empty() {
                continue;
            }
            if let Some(re) = &self.filter {
                let desc = it.description.as_deref().unwrap_or_default();
                if !re.is_match(&title) && !re.is_match(desc) {
                    continue;
                }
            }
            out.push(RawItem {
                title,
                summary: it.description,
                url: it.link.map(|l| l.trim().to_string()),
                published_at: it.pub_date.as_deref().and_then(parse_pub_date),
                source_name: self.name.clone(),
                source_kind: self.kind,
            });
            if self.max_items.is_some_and(|m| out.len() >= m) {
                break;
            }
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        Ok(out)
    }
}

#[async_trait]
impl SourceAdapter for RssAdapter {
    async fn fetch(&self) -> Result<Vec<RawItem>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse(s),
            Mode::Http { url, client } => {
                let body = match client.get(url.as_str()).send().await {
                    Ok(resp) => resp
                        .error_for_status()
                        .with_context(|| format!("{} http status", self.name))?
                        .text()
                        .await
                        .with_context(|| format!("{} http .text()", self.name))?,
                    Err(e) => {
                        tracing::debug!(target: "ingest", error = ?e, adapter = %self.name, "adapter http error");
                        return Err(e).with_context(|| format!("{} http get()", self.name));
                    }
                };
                self.parse(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>t</title>
<item><title>CMMC rule lands</title><link> https://a.test/1 </link>
<pubDate>Sat, 01 Mar 2025 10:00:00 GMT</pubDate><description>&lt;p&gt;text&lt;/p&gt;</description></item>
<item><title>Sports roundup</title><link>https://a.test/2</link></item>
<item><title></title><link>https://a.test/3</link></item>
</channel></rss>"#;

    #[test]
    fn parses_items_and_dates() {
        let a = RssAdapter::from_fixture("FedScoop", XML);
        let items = a.parse(XML).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].url.as_deref(), Some("https://a.test/1"));
        assert_eq!(
            items[0].published_at,
            Some(DateTime::parse_from_rfc3339("2025-03-01T10:00:00Z").unwrap().with_timezone(&Utc))
        );
        assert!(items[1].published_at.is_none());
        assert_eq!(items[0].source_name, "FedScoop");
    }

    #[test]
    fn keyword_filter_keeps_domain_items_only() {
        let a = RssAdapter::from_fixture("general", XML)
            .with_keyword_filter(&["cmmc".to_string()])
            .unwrap();
        let items = a.parse(XML).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "CMMC rule lands");
    }

    #[test]
    fn pub_date_fallbacks() {
        assert!(parse_pub_date("2025-03-01T10:00:00+02:00").is_some());
        assert!(parse_pub_date("yesterday").is_none());
    }
}
