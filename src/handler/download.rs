//! Download handling

use crate::http::{self, ResponseBody};
use crate::logger;
use crate::storage::FileStore;
use hyper::Response;
use percent_encoding::percent_decode_str;

/// Serve `/files/<encoded>`: decode the name, keep only its base name, stream the file
pub async fn serve_download(
    store: &FileStore,
    encoded_name: &str,
    is_head: bool,
) -> Response<ResponseBody> {
    let requested = percent_decode_str(encoded_name).decode_utf8_lossy();

    match store.open_file(&requested).await {
        Ok(Some(stored)) => {
            let body = if is_head {
                http::empty_body()
            } else {
                http::file_body(stored.file)
            };
            http::build_attachment_response(&stored.name, stored.size, body)
        }
        Ok(None) => http::build_file_not_found_response(),
        Err(e) => {
            logger::log_error(&format!("Failed to open stored file '{requested}': {e}"));
            http::build_500_response()
        }
    }
}
