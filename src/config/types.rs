// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub storage: StorageConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Tokio worker threads, defaults to the number of CPU cores
    #[serde(default)]
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    pub show_headers: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    /// Seconds a connection may wait for the next request's headers; 0 disables keep-alive
    pub keep_alive_timeout: u64,
    /// Seconds an upload body may go without new data, and the header deadline without keep-alive
    pub read_timeout: u64,
    /// Seconds open connections get to finish after shutdown is requested
    pub write_timeout: u64,
    #[serde(default)]
    pub max_connections: Option<u64>,
    /// Handle one request at a time across all connections
    #[serde(default)]
    pub sequential: bool,
}

/// Upload storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Flat directory holding every uploaded file
    pub upload_dir: String,
    /// Largest accepted request body for uploads, in bytes
    pub max_upload_size: u64,
    /// Write uploads to a staging file and rename them into place
    pub atomic_writes: bool,
}
