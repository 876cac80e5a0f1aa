// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod curate;
pub mod ingest;
pub mod metrics;
pub mod trend;
pub mod validator;

pub use crate::api::create_router;
pub use crate::config::CurationConfig;
pub use crate::curate::{CurationFailure, CurationReport, Curator};
pub use crate::trend::{Category, RawItem, SourceKind, Trend, TrendCollection};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber: `RUST_LOG` filter (default `info`), JSON lines
/// when `LOG_FORMAT=json`, compact text otherwise. Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}
