use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use castbridge::control_api::{router, ApiState};
use castbridge::coordinator::Coordinator;
use castbridge::directory::Directory;
use castbridge::models::{Capabilities, Device, Protocol};
use tower::ServiceExt;

fn app() -> (axum::Router, Directory) {
    let directory = Directory::new();
    let coordinator = Arc::new(Coordinator::new(directory.clone()));
    let state = ApiState {
        directory: directory.clone(),
        coordinator,
    };
    (router(state), directory)
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _) = app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn devices_lists_upserted_entries_sorted_by_name() {
    let (app, directory) = app();
    directory
        .upsert(Device {
            id: "chromecast-1".into(),
            name: "Bedroom".into(),
            kind: Protocol::Chromecast,
            address: "10.0.0.5".into(),
            port: 8009,
            capabilities: Capabilities::chromecast_default(),
        })
        .await;
    directory
        .upsert(Device {
            id: "dlna-1".into(),
            name: "Attic TV".into(),
            kind: Protocol::Dlna,
            address: "http://10.0.0.9:52235".into(),
            port: 52235,
            capabilities: Capabilities::dlna_default(),
        })
        .await;

    let response = app
        .oneshot(Request::builder().uri("/devices").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let devices: Vec<Device> = serde_json::from_slice(&body).unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].name, "Attic TV");
    assert_eq!(devices[1].name, "Bedroom");
}

#[tokio::test]
async fn unknown_device_returns_404() {
    let (app, _) = app();
    let response = app
        .oneshot(Request::builder().uri("/devices/missing").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn control_without_session_returns_400_not_casting() {
    let (app, _) = app();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/control")
                .header("Content-Type", "application/json")
                .body(Body::from(r#"{"action":"play"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("not currently casting"));
}

#[tokio::test]
async fn status_is_idle_for_a_fresh_process() {
    let (app, _) = app();
    let response = app
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let status: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(status["casting"], false);
}

#[tokio::test]
async fn stop_with_no_session_succeeds() {
    let (app, _) = app();
    let response = app
        .oneshot(Request::builder().method("POST").uri("/stop").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
