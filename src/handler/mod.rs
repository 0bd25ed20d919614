//! Request handler module
//!
//! Routes requests to the listing page, file downloads and uploads.

pub mod download;
pub mod listing;
pub mod router;
pub mod upload;

// Re-export main entry point
pub use router::handle_request;
