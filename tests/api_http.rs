// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use compliance_trends::api::{create_router, AppState};
use compliance_trends::validator::AcceptAll;
use compliance_trends::{CurationConfig, Curator};

const BODY_LIMIT: usize = 1024 * 1024;

fn test_router() -> Router {
    let curator = Curator::new(CurationConfig::default(), Arc::new(AcceptAll)).expect("curator");
    create_router(AppState::new(curator))
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

fn post_curate(payload: Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/curate")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST /curate")
}

#[tokio::test]
async fn health_returns_ok() {
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");
    let (status, body) = send(test_router(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap(), "ok");
}

#[tokio::test]
async fn curate_returns_report_json() {
    let payload = json!({
        "now": "2025-03-01T12:00:00Z",
        "items": [
            {"title": "CMMC final rule published", "url": "https://a.test/1",
             "published_at": "2025-03-01T10:00:00Z", "source_name": "FedScoop", "source_kind": "feed"},
            {"title": "Pentagon awards cloud deal", "summary": "Multi-year award",
             "source_name": "Defense One", "source_kind": "feed"}
        ]
    });
    let (status, body) = send(test_router(), post_curate(payload)).await;
    assert_eq!(status, StatusCode::OK);

    let v: Json = serde_json::from_slice(&body).expect("report json");
    assert_eq!(v["counts"]["raw"], 2);
    assert_eq!(v["counts"]["validated"], 2);
    let cats = &v["collection"]["categories"];
    assert_eq!(cats["cmmc_program"][0]["title"], "CMMC final rule published");
    assert_eq!(cats["defense_industrial_base"][0]["source_name"], "Defense One");
    // missing timestamp defaults to the run's clock
    assert_eq!(cats["defense_industrial_base"][0]["published_at"], "2025-03-01T12:00:00Z");
    assert!(v["keywords"].as_array().is_some());
}

#[tokio::test]
async fn exhausted_run_is_422_with_counts() {
    let payload = json!({
        "items": [{"title": "", "url": "https://a.test/1", "source_name": "x", "source_kind": "forum"}]
    });
    let (status, body) = send(test_router(), post_curate(payload)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let v: Json = serde_json::from_slice(&body).expect("failure json");
    assert_eq!(v["failed_at"], "scoring");
    assert_eq!(v["reason"]["kind"], "pipeline_exhausted");
    assert_eq!(v["counts"]["raw"], 1);
    assert_eq!(v["counts"]["normalized"], 0);
}

#[tokio::test]
async fn bad_source_kind_is_rejected_by_extractor() {
    let payload = json!({
        "items": [{"title": "t", "url": "u", "source_name": "x", "source_kind": "newspaper"}]
    });
    let (status, _) = send(test_router(), post_curate(payload)).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn last_report_is_remembered() {
    let app = test_router();

    let req = Request::builder().uri("/report/last").body(Body::empty()).unwrap();
    let (status, _) = send(app.clone(), req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let payload = json!({
        "items": [{"title": "DFARS clause update", "url": "https://a.test/d", "source_name": "GovCon Wire", "source_kind": "feed"}]
    });
    let (status, _) = send(app.clone(), post_curate(payload)).await;
    assert_eq!(status, StatusCode::OK);

    let req = Request::builder().uri("/report/last").body(Body::empty()).unwrap();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["collection"]["categories"]["nist_compliance"][0]["title"], "DFARS clause update");
}

#[tokio::test]
async fn categories_lists_all_buckets_with_fallback_flag() {
    let req = Request::builder().uri("/categories").body(Body::empty()).unwrap();
    let (status, body) = send(test_router(), req).await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    let arr = v.as_array().unwrap();
    assert_eq!(arr.len(), 6);
    assert_eq!(arr[5]["label"], "federal_cybersecurity");
    assert_eq!(arr[5]["fallback"], true);
    assert_eq!(arr[5]["keywords"], 0);
}
