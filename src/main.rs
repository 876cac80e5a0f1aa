//! Curation service entrypoint.
//! Boots the Axum HTTP server on Shuttle with the curator, relevance judge and metrics wired in.

use compliance_trends::{
    api::{create_router, AppState},
    config::ai::AiConfig,
    init_tracing,
    metrics::Metrics,
    validator::build_judge,
    CurationConfig, Curator,
};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = CurationConfig::from_toml()?;
    let ai = AiConfig::load_default();
    let judge = build_judge(&ai);

    let metrics = Metrics::init(config.ranking.per_category_cap)?;
    let curator = Curator::new(config, judge)?;

    let router = create_router(AppState::new(curator)).merge(metrics.router());
    tracing::info!(target: "curate", "curation service ready");

    Ok(router.into())
}
