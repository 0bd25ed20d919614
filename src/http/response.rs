//! HTTP response building module
//!
//! Provides builders for every response the service sends, decoupled from
//! the handlers that decide which one to send.

use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Bytes, Frame};
use hyper::header::{HeaderValue, ALLOW, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use tokio_stream::StreamExt;
use tokio_util::io::ReaderStream;

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
const ALLOWED_METHODS: &str = "GET, HEAD, POST, OPTIONS";

/// Read size for streamed downloads
const FILE_CHUNK_SIZE: usize = 64 * 1024;

/// Body type of every response: in-memory pages or a file streamed from disk
pub type ResponseBody = UnsyncBoxBody<Bytes, std::io::Error>;

/// Complete in-memory body
pub fn full_body(bytes: impl Into<Bytes>) -> ResponseBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Empty body, used for HEAD responses
pub fn empty_body() -> ResponseBody {
    full_body(Bytes::new())
}

/// Body that reads `file` in fixed-size chunks as the client consumes it
pub fn file_body(file: tokio::fs::File) -> ResponseBody {
    let frames =
        ReaderStream::with_capacity(file, FILE_CHUNK_SIZE).map(|chunk| chunk.map(Frame::data));
    StreamBody::new(frames).boxed_unsync()
}

/// Build an HTML response with the given status
pub fn build_html_response(
    status: StatusCode,
    content: String,
    is_head: bool,
) -> Response<ResponseBody> {
    let content_length = content.len();
    let body = if is_head {
        empty_body()
    } else {
        full_body(content)
    };

    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, HTML_CONTENT_TYPE)
        .header(CONTENT_LENGTH, content_length)
        .body(body)
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(empty_body())
        })
}

/// Build a short HTML message page (`<h2>` fragment plus optional extra markup)
pub fn build_message_response(status: StatusCode, message: &str) -> Response<ResponseBody> {
    build_html_response(status, message.to_string(), false)
}

/// Build a file download response
///
/// `Content-Disposition: attachment; filename="<name>"` carries the stored
/// name and `Content-Length` the file size; `body` is empty for HEAD.
pub fn build_attachment_response(
    name: &str,
    size: u64,
    body: ResponseBody,
) -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_DISPOSITION, content_disposition(name))
        .header(CONTENT_TYPE, "application/octet-stream")
        .header(CONTENT_LENGTH, size)
        .body(body)
        .unwrap_or_else(|e| {
            log_build_error("attachment", &e);
            build_500_response()
        })
}

/// Build 404 response for a missing stored file
pub fn build_file_not_found_response() -> Response<ResponseBody> {
    build_message_response(StatusCode::NOT_FOUND, "<h2>❌ File not found!</h2>")
}

/// Build 404 response for an unknown path
pub fn build_invalid_path_response() -> Response<ResponseBody> {
    build_message_response(StatusCode::NOT_FOUND, "<h2>Invalid path!</h2>")
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header(CONTENT_TYPE, "text/plain")
        .header(ALLOW, ALLOWED_METHODS)
        .body(full_body("405 Method Not Allowed"))
        .unwrap_or_else(|e| {
            log_build_error("405", &e);
            Response::new(full_body("405 Method Not Allowed"))
        })
}

/// Build OPTIONS response
pub fn build_options_response() -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(ALLOW, ALLOWED_METHODS)
        .body(empty_body())
        .unwrap_or_else(|e| {
            log_build_error("OPTIONS", &e);
            Response::new(empty_body())
        })
}

/// Build 500 Internal Server Error response
pub fn build_500_response() -> Response<ResponseBody> {
    let mut response = Response::new(full_body("500 Internal Server Error"));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

/// `attachment; filename="<name>"` with quotes and backslashes escaped.
///
/// Non-ASCII names are sent as raw UTF-8 bytes, which `HeaderValue` accepts
/// as obs-text.
fn content_disposition(name: &str) -> Vec<u8> {
    let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
    format!("attachment; filename=\"{escaped}\"").into_bytes()
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
