use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::extract::{Path as AxumPath, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio_util::io::ReaderStream;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct MediaServerState {
    pub media_root: PathBuf,
    pub subtitles_root: PathBuf,
}

pub fn router(state: MediaServerState) -> Router {
    Router::new()
        .route("/media/*path", get(serve_media))
        .route("/subtitles/:id", get(serve_subtitle))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

struct MediaError(StatusCode, String);

impl IntoResponse for MediaError {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

/// Resolves `requested` (already percent-decoded by axum) against `root`,
/// refusing anything that normalizes outside the allow-listed root.
fn resolve_under_root(root: &Path, requested: &str) -> Result<PathBuf, MediaError> {
    let mut normalized = PathBuf::new();
    for component in Path::new(requested).components() {
        use std::path::Component;
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(MediaError(StatusCode::FORBIDDEN, "path escapes media root".into()))
            }
        }
    }
    Ok(root.join(normalized))
}

fn mime_for(path: &Path) -> String {
    mime_guess::from_path(path).first_or_octet_stream().essence_str().to_string()
}

fn dlna_profile_for(mime: &str) -> &'static str {
    match mime {
        "video/mp4" => "AVC_MP4_HP_HD_AAC",
        "video/x-matroska" => "MATROSKA",
        _ => "AVC_MP4_HP_HD_AAC",
    }
}

fn common_headers(resp: &mut Response, mime: &str) {
    let headers = resp.headers_mut();
    headers.insert(header::ACCEPT_RANGES, "bytes".parse().unwrap());
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".parse().unwrap());
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, "GET, HEAD, OPTIONS".parse().unwrap());
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, "Range, Content-Type".parse().unwrap());
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        "Content-Range, Content-Length, Accept-Ranges".parse().unwrap(),
    );
    headers.insert("transferMode.dlna.org", "Streaming".parse().unwrap());
    headers.insert(
        "contentFeatures.dlna.org",
        format!(
            "DLNA.ORG_PN={};DLNA.ORG_FLAGS=01700000000000000000000000000000",
            dlna_profile_for(mime)
        )
        .parse()
        .unwrap(),
    );
    headers.insert(header::CACHE_CONTROL, "no-cache".parse().unwrap());
}

struct ByteRange {
    start: u64,
    end: u64,
}

/// Parses a single `bytes=` range against a file of `size` bytes. Multiple
/// ranges are not supported and are treated as if no Range header were sent.
fn parse_range(header_value: &str, size: u64) -> Option<Result<ByteRange, ()>> {
    let spec = header_value.strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }
    let (start_str, end_str) = spec.split_once('-')?;

    let range = if start_str.is_empty() {
        let suffix_len: u64 = end_str.parse().ok()?;
        let start = size.saturating_sub(suffix_len);
        ByteRange { start, end: size.saturating_sub(1) }
    } else if end_str.is_empty() {
        let start: u64 = start_str.parse().ok()?;
        ByteRange { start, end: size.saturating_sub(1) }
    } else {
        let start: u64 = start_str.parse().ok()?;
        let end: u64 = end_str.parse().ok()?;
        ByteRange { start, end: end.min(size.saturating_sub(1)) }
    };

    if range.start > range.end || range.start >= size {
        Some(Err(()))
    } else {
        Some(Ok(range))
    }
}

async fn serve_file(root: &Path, requested: &str, headers: &HeaderMap) -> Result<Response, MediaError> {
    let path = resolve_under_root(root, requested)?;
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|_| MediaError(StatusCode::NOT_FOUND, "not found".into()))?;
    if !metadata.is_file() {
        return Err(MediaError(StatusCode::NOT_FOUND, "not found".into()));
    }
    let size = metadata.len();
    let mime = mime_for(&path);

    let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let range = range_header.and_then(|h| parse_range(h, size));

    let mut file = File::open(&path)
        .await
        .map_err(|_| MediaError(StatusCode::NOT_FOUND, "not found".into()))?;

    match range {
        Some(Err(())) => {
            let mut resp = Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, format!("bytes */{size}"))
                .body(Body::empty())
                .unwrap();
            common_headers(&mut resp, &mime);
            Ok(resp)
        }
        Some(Ok(range)) => {
            file.seek(SeekFrom::Start(range.start)).await.map_err(|e| MediaError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
            let len = range.end - range.start + 1;
            let limited = file.take(len);
            let stream = ReaderStream::new(limited);

            let mut resp = Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_TYPE, mime.as_str())
                .header(header::CONTENT_LENGTH, len)
                .header(header::CONTENT_RANGE, format!("bytes {}-{}/{size}", range.start, range.end))
                .body(Body::from_stream(stream))
                .unwrap();
            common_headers(&mut resp, &mime);
            Ok(resp)
        }
        None => {
            let stream = ReaderStream::new(file);
            let mut resp = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, mime.as_str())
                .header(header::CONTENT_LENGTH, size)
                .body(Body::from_stream(stream))
                .unwrap();
            common_headers(&mut resp, &mime);
            Ok(resp)
        }
    }
}

async fn serve_media(
    State(state): State<MediaServerState>,
    AxumPath(path): AxumPath<String>,
    headers: HeaderMap,
) -> Result<Response, MediaError> {
    serve_file(&state.media_root, &path, &headers).await
}

async fn serve_subtitle(
    State(state): State<MediaServerState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Response, MediaError> {
    let path = resolve_under_root(&state.subtitles_root, &id)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| MediaError(StatusCode::NOT_FOUND, "not found".into()))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/vtt; charset=utf-8")],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_inclusive_range() {
        let r = parse_range("bytes=0-99", 1024).unwrap().unwrap();
        assert_eq!((r.start, r.end), (0, 99));
    }

    #[test]
    fn parses_open_ended_range() {
        let r = parse_range("bytes=1000-", 1024).unwrap().unwrap();
        assert_eq!((r.start, r.end), (1000, 1023));
    }

    #[test]
    fn parses_suffix_range() {
        let r = parse_range("bytes=-10", 1024).unwrap().unwrap();
        assert_eq!((r.start, r.end), (1014, 1023));
    }

    #[test]
    fn clamps_end_past_size() {
        let r = parse_range("bytes=1000-5000", 1024).unwrap().unwrap();
        assert_eq!((r.start, r.end), (1000, 1023));
    }

    #[test]
    fn rejects_unsatisfiable_range() {
        assert!(parse_range("bytes=2000-3000", 1024).unwrap().is_err());
    }

    #[test]
    fn rejects_multi_range() {
        assert!(parse_range("bytes=0-10,20-30", 1024).is_none());
    }

    #[test]
    fn resolves_plain_relative_path() {
        let root = Path::new("/srv/media");
        assert_eq!(resolve_under_root(root, "movie.mp4").unwrap(), PathBuf::from("/srv/media/movie.mp4"));
    }

    #[test]
    fn rejects_parent_dir_escape() {
        let root = Path::new("/srv/media");
        assert!(resolve_under_root(root, "../../etc/passwd").is_err());
    }

    #[test]
    fn rejects_absolute_path_component() {
        let root = Path::new("/srv/media");
        assert!(resolve_under_root(root, "/etc/passwd").is_err());
    }
}
