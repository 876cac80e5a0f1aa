//! One-shot curation run.
//!
//!   curate <items.json> [--now <rfc3339>]   curate raw items from a JSON array
//!   curate --fetch [--now <rfc3339>]        collect from the configured feeds first
//!
//! Prints the report as JSON on stdout. Exits with 2 when the run fails.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use compliance_trends::{
    config::ai::AiConfig,
    ingest::{collect_all, config::build_adapters, config::load_feeds_default},
    init_tracing,
    validator::build_judge,
    CurationConfig, Curator, RawItem,
};

enum Input {
    File(String),
    Fetch,
}

fn parse_args() -> Result<(Input, Option<DateTime<Utc>>)> {
    let mut input = None;
    let mut now = None;
    let mut args = std::env::args().skip(1);
    while let Some(a) = args.next() {
        match a.as_str() {
            "--fetch" => input = Some(Input::Fetch),
            "--now" => {
                let v = args.next().context("--now needs a value")?;
                let ts = DateTime::parse_from_rfc3339(&v)
                    .with_context(|| format!("bad --now `{v}`"))?;
                now = Some(ts.with_timezone(&Utc));
            }
            other if !other.starts_with("--") => input = Some(Input::File(other.to_string())),
            other => bail!("unknown flag {other}"),
        }
    }
    match input {
        Some(i) => Ok((i, now)),
        None => bail!("usage: curate <items.json> | --fetch [--now <rfc3339>]"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let (input, now) = parse_args()?;
    let config = CurationConfig::from_toml()?;

    let items: Vec<RawItem> = match input {
        Input::File(path) => {
            let data = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            serde_json::from_str(&data).with_context(|| format!("parsing {path}"))?
        }
        Input::Fetch => {
            let feeds = load_feeds_default()?;
            let adapters = build_adapters(&feeds, &config.categories)?;
            collect_all(&adapters).await.items
        }
    };

    let judge = build_judge(&AiConfig::load_default());
    let curator = Curator::new(config, judge)?;

    match curator.curate(items, now.unwrap_or_else(Utc::now)).await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(failure) => {
            println!("{}", serde_json::to_string_pretty(&failure)?);
            tracing::error!(target: "curate", %failure, "curation failed");
            std::process::exit(2);
        }
    }
}
