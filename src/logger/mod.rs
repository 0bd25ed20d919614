//! Logger module
//!
//! Provides logging utilities for the file sharing server including:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Upload, error and warning logging
//! - File-based logging support

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use crate::config::Config;
use std::net::SocketAddr;

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    writer::init(
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

/// Reopen log files (SIGUSR1)
pub fn reopen(config: &Config) -> std::io::Result<()> {
    match writer::get() {
        Some(w) => w.reopen(
            config.logging.access_log_file.as_deref(),
            config.logging.error_log_file.as_deref(),
        ),
        None => Ok(()),
    }
}

/// Write to info/access log
fn write_info(message: &str) {
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

/// Write to error log
fn write_error(message: &str) {
    match writer::get() {
        Some(w) => w.write_error(message),
        None => eprintln!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    write_info("======================================");
    write_info("File sharing server started");
    write_info(&format!("Listening on: http://{addr}"));
    write_info(&format!("Upload directory: {}", config.storage.upload_dir));
    write_info(&format!(
        "Max upload size: {} bytes",
        config.storage.max_upload_size
    ));
    write_info(&format!(
        "Atomic writes: {}",
        if config.storage.atomic_writes { "on" } else { "off" }
    ));
    write_info(&format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        write_info(&format!("Worker threads: {workers}"));
    }
    if let Some(max) = config.performance.max_connections {
        write_info(&format!("Max connections: {max}"));
    }
    if config.performance.sequential {
        write_info("Request handling: sequential (one request at a time)");
    } else {
        write_info("Request handling: concurrent");
    }
    if let Some(ref path) = config.logging.access_log_file {
        write_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(&format!("Error log: {path}"));
    }
    write_info("======================================\n");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    write_info(&format!("[Connection] Accepted from: {peer_addr}"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write_error(&format!("[ERROR] Failed to serve connection: {err:?}"));
}

pub fn log_error(message: &str) {
    write_error(&format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write_error(&format!("[WARN] {message}"));
}

pub fn log_info(message: &str) {
    write_info(&format!("[INFO] {message}"));
}

pub fn log_headers_count(count: usize, show: bool) {
    if show {
        write_info(&format!("[Headers] Count: {count}"));
    }
}

pub fn log_upload_saved(name: &str, size: usize, content_type: Option<&str>) {
    let content_type = content_type.unwrap_or("unknown type");
    write_info(&format!("[Upload] Saved '{name}' ({size} bytes, {content_type})"));
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    match writer::get() {
        Some(w) => w.write_access(&entry.format(format)),
        None => println!("{}", entry.format(format)),
    }
}

pub fn log_shutdown(active_connections: usize) {
    write_info(&format!(
        "[Shutdown] Listener closed, {active_connections} connection(s) still finishing"
    ));
}
