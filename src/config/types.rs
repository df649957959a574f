// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

use crate::logger::Level;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    /// Listen backlog handed to the socket
    pub backlog: i32,
}

/// REST surface configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    /// Prefix of every API path, e.g. `/v1`
    pub api_version: String,
    /// Segment of the job polling path under the version prefix
    pub async_job_path: String,
    /// Externally visible address polling locations are built from
    pub base_url: String,
    /// Request header asking for a schema of the response
    pub schema_header: String,
    /// Age after which an async job reports `expired`
    pub job_expiry_secs: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    pub access_log: bool,
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
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
    /// Largest accepted request body in bytes
    pub max_body_size: u64,
}
