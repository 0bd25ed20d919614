//! Listing page
//!
//! Renders the upload form and one download link per stored file.

use crate::handler::router::DOWNLOAD_PREFIX;
use crate::http::{self, ResponseBody};
use crate::logger;
use crate::storage::FileStore;
use hyper::{Response, StatusCode};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters escaped in a download link; unreserved characters stay readable
const FILE_NAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>filedrop</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Arial, sans-serif;
            background: #eef1f5;
            color: #2d3340;
            display: flex;
            flex-direction: column;
            align-items: center;
            padding: 32px 16px;
        }
        h1 {
            margin-bottom: 24px;
        }
        .panel {
            background: #ffffff;
            border-radius: 10px;
            box-shadow: 0 2px 12px rgba(0, 0, 0, 0.08);
            padding: 24px;
            width: 100%;
            max-width: 420px;
            margin-bottom: 20px;
            text-align: center;
        }
        input[type=file] {
            margin: 14px 0;
        }
        button {
            background: #2f6fde;
            color: #ffffff;
            border: none;
            border-radius: 6px;
            padding: 10px 22px;
            font-size: 15px;
            cursor: pointer;
        }
        button:hover {
            background: #255bb8;
        }
        ul {
            list-style: none;
            padding: 0;
            text-align: left;
        }
        li {
            margin: 6px 0;
            word-break: break-all;
        }
        a {
            color: #2f6fde;
            font-weight: 600;
            text-decoration: none;
        }
        a:hover {
            text-decoration: underline;
        }
    </style>
</head>
<body>
    <h1>📂 filedrop</h1>
    <div class="panel">
        <h3>Upload a file</h3>
        <form enctype="multipart/form-data" method="post">
            <input type="file" name="file" required>
            <br>
            <button type="submit">Upload</button>
        </form>
    </div>
    <div class="panel">
        <h3>Available files</h3>
        <ul>
"#;

const PAGE_TAIL: &str = r"        </ul>
    </div>
</body>
</html>
";

/// Serve the listing page
pub async fn serve_listing(store: &FileStore, is_head: bool) -> Response<ResponseBody> {
    match store.list().await {
        Ok(names) => http::build_html_response(StatusCode::OK, render_page(&names), is_head),
        Err(e) => {
            logger::log_error(&format!(
                "Failed to list upload directory '{}': {e}",
                store.root().display()
            ));
            http::build_500_response()
        }
    }
}

/// Render the full page for the given file names, in the given order
pub fn render_page(names: &[String]) -> String {
    let mut html = String::with_capacity(PAGE_HEAD.len() + PAGE_TAIL.len() + names.len() * 64);
    html.push_str(PAGE_HEAD);
    for name in names {
        html.push_str("            ");
        html.push_str(&file_link(name));
        html.push('\n');
    }
    html.push_str(PAGE_TAIL);
    html
}

/// `<li>` entry linking to the download path of `name`
fn file_link(name: &str) -> String {
    format!(
        "<li><a href='{DOWNLOAD_PREFIX}{}'>{}</a></li>",
        utf8_percent_encode(name, FILE_NAME_ENCODE_SET),
        escape_html(name)
    )
}

/// Escape text for use inside HTML element content
fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
