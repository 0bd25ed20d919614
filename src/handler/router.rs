//! Request routing dispatch module
//!
//! Entry point for every HTTP request: method and path dispatch plus access logging.

use crate::config::AppState;
use crate::handler::{download, listing, upload};
use crate::http::{self, ResponseBody};
use crate::logger::{self, AccessLogEntry};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderName, CONTENT_LENGTH, REFERER, USER_AGENT};
use hyper::{Method, Request, Response, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

/// Path prefix under which stored files are downloaded
pub const DOWNLOAD_PREFIX: &str = "/files/";

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    remote_addr: SocketAddr,
) -> Result<Response<ResponseBody>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();

    // Held until the response is built when requests are sequential
    let _permit = state.admit().await;

    logger::log_headers_count(req.headers().len(), state.config.logging.show_headers);

    let entry = state
        .cached_access_log
        .load(Ordering::Relaxed)
        .then(|| access_entry(&req, remote_addr));

    let response = route_request(req, &state).await;

    if let Some(mut entry) = entry {
        entry.status = response.status().as_u16();
        entry.body_bytes = body_bytes(&response);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Dispatch on method, then on path
async fn route_request<B>(req: Request<B>, state: &AppState) -> Response<ResponseBody>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    match method {
        Method::GET | Method::HEAD => {
            route_read(req.uri().path(), state, method == Method::HEAD).await
        }
        // Uploads are accepted on any path
        Method::POST => {
            let limits = upload::UploadLimits::from_config(&state.config);
            upload::handle_upload(req, &state.store, limits).await
        }
        Method::OPTIONS => http::build_options_response(),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            http::build_405_response()
        }
    }
}

/// Route GET/HEAD requests
async fn route_read(path: &str, state: &AppState, is_head: bool) -> Response<ResponseBody> {
    if path == "/" {
        return listing::serve_listing(&state.store, is_head).await;
    }

    if let Some(encoded_name) = path.strip_prefix(DOWNLOAD_PREFIX) {
        return download::serve_download(&state.store, encoded_name, is_head).await;
    }

    http::build_invalid_path_response()
}

/// Bytes sent in the body: exact for in-memory bodies, `Content-Length` for streamed files
fn body_bytes(response: &Response<ResponseBody>) -> usize {
    let length = response.body().size_hint().exact().or_else(|| {
        response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
    });
    length
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or_default()
}

fn access_entry<B>(req: &Request<B>, remote_addr: SocketAddr) -> AccessLogEntry {
    let header = |name: HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        remote_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = http_version(req.version()).to_string();
    entry.referer = header(REFERER);
    entry.user_agent = header(USER_AGENT);
    entry
}

const fn http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use http_body_util::{BodyExt, Full};
    use hyper::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
    use hyper::StatusCode;

    const BOUNDARY: &str = "X-FILEDROP-BOUNDARY";

    fn test_state(dir: &std::path::Path) -> Arc<AppState> {
        let mut config = Config::load_from("does-not-exist/filedrop-test").unwrap();
        config.storage.upload_dir = dir.to_string_lossy().into_owned();
        config.storage.max_upload_size = 4096;
        config.logging.access_log = false;
        Arc::new(AppState::new(&config).unwrap())
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn request(method: &str, uri: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn upload(content_type: &str, filename: &str, data: &[u8]) -> Request<Full<Bytes>> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, body.len())
            .body(Full::new(Bytes::from(body)))
            .unwrap()
    }

    async fn send(state: &Arc<AppState>, req: Request<Full<Bytes>>) -> Response<ResponseBody> {
        handle_request(req, Arc::clone(state), peer()).await.unwrap()
    }

    async fn text(resp: Response<ResponseBody>) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_empty_listing() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let resp = send(&state, request("GET", "/")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
        let html = text(resp).await;
        assert!(html.contains("<ul>"));
        assert!(!html.contains("<li>"));
    }

    #[tokio::test]
    async fn test_upload_then_download_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let content: Vec<u8> = (0..=255u8).collect();

        let resp = send(
            &state,
            upload(&format!("multipart/form-data; boundary={BOUNDARY}"), "data.bin", &content),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(text(resp).await.contains("<a href='/'>Go back</a>"));

        let resp = send(&state, request("GET", "/files/data.bin")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[CONTENT_DISPOSITION],
            "attachment; filename=\"data.bin\""
        );
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/octet-stream");
        assert_eq!(resp.headers()[CONTENT_LENGTH], "256");
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes.to_vec(), content);

        let html = text(send(&state, request("GET", "/")).await).await;
        assert!(html.contains("<li><a href='/files/data.bin'>data.bin</a></li>"));
    }

    #[tokio::test]
    async fn test_second_upload_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let content_type = format!("multipart/form-data; boundary={BOUNDARY}");

        send(&state, upload(&content_type, "same.txt", b"first version")).await;
        send(&state, upload(&content_type, "same.txt", b"second")).await;

        let resp = send(&state, request("GET", "/files/same.txt")).await;
        assert_eq!(text(resp).await, "second");
    }

    #[tokio::test]
    async fn test_quoted_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let resp = send(
            &state,
            upload(&format!("multipart/form-data; boundary=\"{BOUNDARY}\""), "q.txt", b"quoted"),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(std::fs::read(dir.path().join("q.txt")).unwrap(), b"quoted");
    }

    #[tokio::test]
    async fn test_upload_with_path_in_filename() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("uploads");
        let state = test_state(&root);
        let content_type = format!("multipart/form-data; boundary={BOUNDARY}");

        for (filename, expected) in [
            ("../../escape.txt", "escape.txt"),
            ("C:\\temp\\win.txt", "win.txt"),
            ("/abs/path/abs.txt", "abs.txt"),
        ] {
            let resp = send(&state, upload(&content_type, filename, b"x")).await;
            assert_eq!(resp.status(), StatusCode::OK, "filename: {filename}");
            assert!(root.join(expected).is_file(), "filename: {filename}");
        }
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_download() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let resp = send(&state, request("GET", "/files/doesnotexist.txt")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(text(resp).await.contains("File not found!"));
    }

    #[tokio::test]
    async fn test_invalid_path() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        for path in ["/index.html", "/files", "/other/files/x"] {
            let resp = send(&state, request("GET", path)).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "path: {path}");
            assert!(text(resp).await.contains("Invalid path!"));
        }
    }

    #[tokio::test]
    async fn test_plain_text_post_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "text/plain")
            .body(Full::new(Bytes::from_static(b"hello")))
            .unwrap();
        let resp = send(&state, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_description_only_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"description\"\r\n\r\nsome text\r\n--{BOUNDARY}--\r\n"
        );
        let req = Request::builder()
            .method("POST")
            .uri("/upload")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Full::new(Bytes::from(body)))
            .unwrap();
        let resp = send(&state, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(text(resp).await.contains("No file uploaded!"));
    }

    #[tokio::test]
    async fn test_upload_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let resp = send(
            &state,
            upload(
                &format!("multipart/form-data; boundary={BOUNDARY}"),
                "huge.bin",
                &[0u8; 8192],
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(!dir.path().join("huge.bin").exists());
    }

    #[tokio::test]
    async fn test_head_and_other_methods() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let resp = send(&state, request("HEAD", "/")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(text(resp).await.is_empty());

        let resp = send(&state, request("OPTIONS", "/")).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = send(&state, request("DELETE", "/files/a.txt")).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_sequential_mode_serves_requests() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::load_from("does-not-exist/filedrop-test").unwrap();
        config.storage.upload_dir = dir.path().to_string_lossy().into_owned();
        config.performance.sequential = true;
        config.logging.access_log = false;
        let state = Arc::new(AppState::new(&config).unwrap());

        let (a, b) = tokio::join!(
            send(&state, request("GET", "/")),
            send(&state, request("GET", "/files/none"))
        );
        assert_eq!(a.status(), StatusCode::OK);
        assert_eq!(b.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_logged_body_size() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        std::fs::write(dir.path().join("f.bin"), [1u8; 42]).unwrap();

        let resp = send(&state, request("GET", "/files/f.bin")).await;
        assert_eq!(body_bytes(&resp), 42);

        let resp = send(&state, request("HEAD", "/files/f.bin")).await;
        assert_eq!(body_bytes(&resp), 0);

        let resp = send(&state, request("GET", "/")).await;
        let logged = body_bytes(&resp);
        assert_eq!(logged, text(resp).await.len());
    }

    #[test]
    fn test_access_entry_fields() {
        let req = Request::builder()
            .method("GET")
            .uri("/files/a.txt?dl=1")
            .header(USER_AGENT, "curl/8.5.0")
            .body(())
            .unwrap();
        let entry = access_entry(&req, peer());
        assert_eq!(entry.remote_addr, "127.0.0.1");
        assert_eq!(entry.method, "GET");
        assert_eq!(entry.path, "/files/a.txt");
        assert_eq!(entry.query.as_deref(), Some("dl=1"));
        assert_eq!(entry.user_agent.as_deref(), Some("curl/8.5.0"));
        assert_eq!(entry.referer, None);
    }
}
