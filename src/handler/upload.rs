//! Upload handling
//!
//! Accepts a `multipart/form-data` POST, stores the first part whose field
//! name is `file` and which carries a filename, and ignores everything else.

use crate::config::Config;
use crate::http::{self, ResponseBody};
use crate::logger;
use crate::multipart::{self, MultipartError, Parts};
use crate::storage::{FileStore, StorageError};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use std::pin::pin;
use std::time::Duration;
use thiserror::Error;

/// Form field that carries the uploaded file
pub const FILE_FIELD: &str = "file";

const UPLOAD_OK: &str = "<h2>✅ File uploaded successfully!</h2><a href='/'>Go back</a>";

/// Bounds applied while receiving an upload body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    /// Largest accepted body, in bytes
    pub max_size: u64,
    /// Longest the client may go without sending any body data
    pub idle_timeout: Duration,
}

impl UploadLimits {
    pub const fn from_config(config: &Config) -> Self {
        Self {
            max_size: config.storage.max_upload_size,
            idle_timeout: Duration::from_secs(config.performance.read_timeout),
        }
    }
}

/// Reasons an upload is rejected
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error("no 'file' part with a filename")]
    NoFile,

    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("no body data received for {}s", idle.as_secs_f64())]
    TimedOut { idle: Duration },

    #[error("failed to read request body: {0}")]
    Body(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl UploadError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::TimedOut { .. } => StatusCode::REQUEST_TIMEOUT,
            Self::Storage(StorageError::Write { .. } | StorageError::Task(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// HTML fragment shown to the client
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Multipart(MultipartError::NotFormData) => "<h2>❌ Invalid upload request!</h2>",
            Self::Multipart(MultipartError::MissingBoundary) => "<h2>❌ Missing boundary!</h2>",
            Self::Multipart(_) => "<h2>❌ Malformed multipart body!</h2>",
            Self::NoFile => "<h2>❌ No file uploaded!</h2>",
            Self::TooLarge { .. } => "<h2>❌ File too large!</h2>",
            Self::TimedOut { .. } => "<h2>❌ Upload timed out!</h2>",
            Self::Body(_) => "<h2>❌ Upload interrupted!</h2>",
            Self::Storage(StorageError::InvalidName(_)) => "<h2>❌ Invalid file name!</h2>",
            Self::Storage(_) => "<h2>❌ Failed to save file!</h2>",
        }
    }
}

/// A successfully stored upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedUpload {
    pub name: String,
    pub size: usize,
    /// Content-Type the client declared for the part
    pub content_type: Option<String>,
}

/// Handle an upload request and build the response
pub async fn handle_upload<B>(
    req: Request<B>,
    store: &FileStore,
    limits: UploadLimits,
) -> Response<ResponseBody>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match receive_upload(req, store, limits).await {
        Ok(saved) => {
            logger::log_upload_saved(&saved.name, saved.size, saved.content_type.as_deref());
            http::build_message_response(StatusCode::OK, UPLOAD_OK)
        }
        Err(err) => {
            let status = err.status();
            if status.is_server_error() {
                logger::log_error(&format!("Upload failed: {err}"));
            } else {
                logger::log_warning(&format!("Upload rejected: {err}"));
            }
            http::build_message_response(status, err.message())
        }
    }
}

/// Validate, read, parse and persist an upload
pub async fn receive_upload<B>(
    req: Request<B>,
    store: &FileStore,
    limits: UploadLimits,
) -> Result<SavedUpload, UploadError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let boundary = multipart::parse_boundary(content_type)?;

    // Reject oversized uploads before reading anything
    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > limits.max_size) {
        return Err(UploadError::TooLarge {
            limit: limits.max_size,
        });
    }

    let body = read_body(req.into_body(), limits).await?;

    for part in Parts::new(body, &boundary) {
        let part = part?;
        if !part.is_file_field(FILE_FIELD) {
            continue;
        }
        let filename = part.headers.filename().unwrap_or_default();
        let size = part.body.len();
        let content_type = part.headers.get("content-type").map(ToString::to_string);
        let name = store.save(filename, part.body).await?;
        return Ok(SavedUpload {
            name,
            size,
            content_type,
        });
    }

    Err(UploadError::NoFile)
}

/// Buffer the whole body frame by frame.
///
/// Fails once it grows past `max_size` bytes, or when no frame arrives
/// within `idle_timeout`. A slow but steady sender is never cut off.
async fn read_body<B>(body: B, limits: UploadLimits) -> Result<Bytes, UploadError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let cap = usize::try_from(limits.max_size).unwrap_or(usize::MAX);
    let mut body = pin!(Limited::new(body, cap));
    let mut buffer = Vec::new();

    loop {
        let frame = match tokio::time::timeout(limits.idle_timeout, body.frame()).await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(_) => {
                return Err(UploadError::TimedOut {
                    idle: limits.idle_timeout,
                })
            }
        };

        match frame {
            Ok(frame) => {
                // Trailers carry nothing we store
                if let Ok(data) = frame.into_data() {
                    buffer.extend_from_slice(&data);
                }
            }
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                return Err(UploadError::TooLarge {
                    limit: limits.max_size,
                })
            }
            Err(e) => return Err(UploadError::Body(e.to_string())),
        }
    }

    Ok(Bytes::from(buffer))
}
