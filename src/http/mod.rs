//! HTTP protocol layer module
//!
//! Response builders shared by the listing, download and upload handlers.

pub mod response;

// Re-export commonly used builders
pub use response::{
    build_405_response, build_500_response, build_attachment_response,
    build_file_not_found_response, build_html_response, build_invalid_path_response,
    build_message_response, build_options_response, empty_body, file_body, full_body,
    ResponseBody,
};
