//! API integration tests

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::time::Duration;

use alarmsrv::api::create_router;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

mod common;
use common::{start_service, test_config, wait_until, TH_PATH};

/// Helper to make JSON requests
async fn json_request(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = if let Some(json) = body {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap()
    } else {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health_check() {
    let (service, _) = start_service(test_config());
    let app = create_router(service.clone());

    let (status, body) = json_request(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "alarmsrv");

    service.shutdown().await;
}

#[tokio::test]
async fn test_ingest_statuses() {
    let (service, recorder) = start_service(test_config());
    let app = create_router(service.clone());

    let (status, body) = json_request(
        &app,
        "POST",
        "/api/ingest",
        Some(json!({ "path": TH_PATH, "fields": { "temperature": 28.0 }, "period": 60 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fired"], 1);
    assert_eq!(body["forwarded"], 1);
    assert_eq!(recorder.len(), 1);

    let (status, body) = json_request(
        &app,
        "POST",
        "/api/ingest",
        Some(json!({ "path": "bad/path", "fields": { "temperature": 28.0 } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);

    let (status, body) = json_request(
        &app,
        "POST",
        "/api/ingest",
        Some(json!({ "path": "fw/site-x/nobody/TH_v2/data", "fields": { "temperature": 28.0 } })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["reason"], "unknown_device");

    service.shutdown().await;
}

#[tokio::test]
async fn test_replace_conditions_rejects_overlap() {
    let (service, _) = start_service(test_config());
    let app = create_router(service.clone());

    let overlapping = json!([
        { "id": 1, "sensor_kind": "TH", "severity": "WARNING", "data_type": "NUMERIC",
          "operator": "BETWEEN", "threshold1": 25.0, "threshold2": 30.0 },
        { "id": 2, "sensor_kind": "TH", "severity": "DANGER", "data_type": "NUMERIC",
          "operator": "GREATER_THAN", "threshold1": 28.0 }
    ]);
    let (status, _) = json_request(&app, "PUT", "/api/conditions/TH", Some(overlapping)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Stored set unchanged
    let (status, body) = json_request(&app, "GET", "/api/conditions/TH", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let valid = json!([
        { "id": 5, "sensor_kind": "TH", "severity": "DANGER", "data_type": "NUMERIC",
          "operator": "GREATER_THAN", "threshold1": 35.0 }
    ]);
    let (status, body) = json_request(&app, "PUT", "/api/conditions/TH", Some(valid)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let boolean_gt = json!([
        { "id": 6, "sensor_kind": "DOOR", "severity": "CAUTION", "data_type": "BOOLEAN",
          "operator": "GREATER_THAN", "bool_threshold": true }
    ]);
    let (status, _) = json_request(&app, "PUT", "/api/conditions/DOOR", Some(boolean_gt)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = json_request(&app, "DELETE", "/api/conditions/TH", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = json_request(&app, "GET", "/api/conditions/TH", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    service.shutdown().await;
}

#[tokio::test]
async fn test_subscribe_stream_starts_with_connect() {
    let (service, _) = start_service(test_config());
    let app = create_router(service.clone());

    let request = Request::builder()
        .uri("/api/alarms/subscribe?clientId=dash-7")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    let mut body = response.into_body();
    let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.contains("event: connect"), "{}", text);
    assert!(text.contains("data: dash-7"), "{}", text);
    assert!(service.registry().contains("dash-7"));

    // Client goes away
    drop(body);
    assert!(
        wait_until(Duration::from_secs(5), || async {
            !service.registry().contains("dash-7")
        })
        .await
    );

    service.shutdown().await;
}

#[tokio::test]
async fn test_unsubscribe_and_stats() {
    let (service, _) = start_service(test_config());
    let app = create_router(service.clone());
    let _sub = service.registry().subscribe("dash-1");

    let (status, body) = json_request(&app, "GET", "/api/alarms/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connections"], 1);
    assert_eq!(body["bus"]["dropped"], 0);

    let (status, _) = json_request(&app, "DELETE", "/api/alarms/subscribe/dash-1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = json_request(&app, "DELETE", "/api/alarms/subscribe/dash-1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(service.registry().is_empty());

    service.shutdown().await;
}
