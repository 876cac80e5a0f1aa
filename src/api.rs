// src/api.rs
use std::sync::{Arc, RwLock};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::curate::{CurationReport, Curator};
use crate::trend::{Category, RawItem};

#[derive(Clone)]
pub struct AppState {
    curator: Arc<Curator>,
    last: Arc<RwLock<Option<CurationReport>>>,
}

impl AppState {
    pub fn new(curator: Curator) -> Self {
        Self {
            curator: Arc::new(curator),
            last: Arc::new(RwLock::new(None)),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/categories", get(categories))
        .route("/curate", post(curate))
        .route("/report/last", get(last_report))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Deserialize)]
struct CurateReq {
    items: Vec<RawItem>,
    /// Pins the clock for reproducible runs; defaults to the current time.
    #[serde(default)]
    now: Option<DateTime<Utc>>,
}

async fn curate(State(state): State<AppState>, Json(req): Json<CurateReq>) -> Response {
    let now = req.now.unwrap_or_else(Utc::now);
    match state.curator.curate(req.items, now).await {
        Ok(report) => {
            if let Ok(mut g) = state.last.write() {
                *g = Some(report.clone());
            }
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(failure) => (StatusCode::UNPROCESSABLE_ENTITY, Json(failure)).into_response(),
    }
}

async fn last_report(State(state): State<AppState>) -> Response {
    let last = state.last.read().ok().and_then(|g| g.clone());
    match last {
        Some(report) => Json(report).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

#[derive(Serialize)]
struct CategoryOut {
    label: &'static str,
    fallback: bool,
    keywords: usize,
}

async fn categories(State(state): State<AppState>) -> Json<Vec<CategoryOut>> {
    let cfg = &state.curator.config().categories;
    let out = Category::ALL
        .iter()
        .map(|c| CategoryOut {
            label: c.label(),
            fallback: *c == cfg.fallback,
            keywords: cfg
                .rules
                .iter()
                .filter(|r| r.category == *c)
                .map(|r| r.keywords.len())
                .sum(),
        })
        .collect();
    Json(out)
}
