//! API integration tests.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

mod common;
use common::{RecordingExecutor, online, test_app};

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app(online(), RecordingExecutor::instant(true));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .method(Method::GET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["connections"], 0);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = test_app(online(), RecordingExecutor::instant(true));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/sessions")
                .method(Method::GET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
