use std::io::Write;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use castbridge::media_server::{router, MediaServerState};
use tempfile::tempdir;
use tower::ServiceExt;

fn make_fixture(dir: &std::path::Path, name: &str, size: usize) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    let bytes: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();
    file.write_all(&bytes).unwrap();
    path
}

fn app(root: &std::path::Path) -> axum::Router {
    router(MediaServerState {
        media_root: root.to_path_buf(),
        subtitles_root: root.to_path_buf(),
    })
}

#[tokio::test]
async fn inclusive_range_returns_partial_content() {
    let dir = tempdir().unwrap();
    make_fixture(dir.path(), "f.bin", 1024);

    let response = app(dir.path())
        .oneshot(
            Request::builder()
                .uri("/media/f.bin")
                .header("Range", "bytes=0-99")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers().get("Content-Range").unwrap(), "bytes 0-99/1024");
    assert_eq!(response.headers().get("Content-Length").unwrap(), "100");

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let expected: Vec<u8> = (0..100u32).map(|i| (i % 256) as u8).collect();
    assert_eq!(body.as_ref(), expected.as_slice());
}

#[tokio::test]
async fn open_ended_range_reaches_end_of_file() {
    let dir = tempdir().unwrap();
    make_fixture(dir.path(), "f.bin", 1024);

    let response = app(dir.path())
        .oneshot(
            Request::builder()
                .uri("/media/f.bin")
                .header("Range", "bytes=1000-")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers().get("Content-Range").unwrap(), "bytes 1000-1023/1024");
    assert_eq!(response.headers().get("Content-Length").unwrap(), "24");
}

#[tokio::test]
async fn suffix_range_takes_last_n_bytes() {
    let dir = tempdir().unwrap();
    make_fixture(dir.path(), "f.bin", 1024);

    let response = app(dir.path())
        .oneshot(
            Request::builder()
                .uri("/media/f.bin")
                .header("Range", "bytes=-10")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers().get("Content-Range").unwrap(), "bytes 1014-1023/1024");
}

#[tokio::test]
async fn unsatisfiable_range_returns_416() {
    let dir = tempdir().unwrap();
    make_fixture(dir.path(), "f.bin", 1024);

    let response = app(dir.path())
        .oneshot(
            Request::builder()
                .uri("/media/f.bin")
                .header("Range", "bytes=2000-3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(response.headers().get("Content-Range").unwrap(), "bytes */1024");
}

#[tokio::test]
async fn missing_range_header_returns_full_file() {
    let dir = tempdir().unwrap();
    make_fixture(dir.path(), "f.bin", 1024);

    let response = app(dir.path())
        .oneshot(Request::builder().uri("/media/f.bin").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("Content-Length").unwrap(), "1024");
}

#[tokio::test]
async fn path_traversal_outside_root_is_rejected() {
    let dir = tempdir().unwrap();
    make_fixture(dir.path(), "f.bin", 16);

    let response = app(dir.path())
        .oneshot(Request::builder().uri("/media/..%2f..%2fetc%2fpasswd").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_ne!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_file_returns_404() {
    let dir = tempdir().unwrap();

    let response = app(dir.path())
        .oneshot(Request::builder().uri("/media/nope.mp4").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
