//! Logger module
//!
//! Provides logging utilities for the gateway including:
//! - Server lifecycle logging
//! - Request/response tracing built from the per-request context
//! - Access logging with multiple formats
//! - File-based logging support

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;

use crate::config::Config;
use crate::handler::RequestContext;

/// Severity threshold, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        })
    }
}

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    writer::init(
        config.logging.level,
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

/// Whether lines at `level` are written; `info` until [`init`] runs
pub fn enabled(level: Level) -> bool {
    let current = writer::get().map_or(Level::Info, writer::LogWriter::level);
    level <= current
}

/// Write to info/access log
fn write_info(message: &str) {
    match writer::get() {
        Some(w) => w.write_info(message),
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

/// Write to access log specifically
fn write_access(message: &str) {
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    write_info("======================================");
    write_info("Gateway started successfully");
    write_info(&format!("Listening on: http://{addr}"));
    write_info(&format!(
        "API prefix: {} (jobs at {}{})",
        config.gateway.api_version, config.gateway.api_version, config.gateway.async_job_path
    ));
    write_info(&format!("Base URL: {}", config.gateway.base_url));
    write_info(&format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        write_info(&format!("Worker threads: {workers}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(&format!("Error log: {path}"));
    }
    write_info("======================================\n");
}

pub fn log_registry_built(apis: usize, paths: usize) {
    write_info(&format!("[Registry] {apis} APIs registered under {paths} paths"));
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    log_debug(&format!("[Connection] Accepted from: {peer_addr}"));
}

pub fn log_connection_error(err: &impl fmt::Debug) {
    write_error(&format!("[ERROR] Failed to serve connection: {err:?}"));
}

pub fn log_error(message: &str) {
    write_error(&format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    if enabled(Level::Warn) {
        write_error(&format!("[WARN] {message}"));
    }
}

pub fn log_info(message: &str) {
    if enabled(Level::Info) {
        write_info(message);
    }
}

pub fn log_debug(message: &str) {
    if enabled(Level::Debug) {
        write_info(&format!("[DEBUG] {message}"));
    }
}

pub fn log_job_completed(job_id: &str, api_type: &str, success: bool) {
    let outcome = if success { "succeeded" } else { "failed" };
    log_debug(&format!("[Job] {job_id} ({api_type}) {outcome}"));
}

/// Full request line, written at `trace`
pub fn log_request_trace(ctx: &RequestContext, body: &str) {
    if !enabled(Level::Trace) {
        return;
    }

    let headers: Vec<String> = ctx
        .headers
        .iter()
        .map(|(name, value)| format!("{name}: {}", value.to_str().unwrap_or("<binary>")))
        .collect();
    write_info(&format!(
        "[ID: {}, Method: {}] Request from {} (to {}), Session: {}, Headers: {{{}}}, Query: {}, Body: {}",
        ctx.request_id,
        ctx.method,
        ctx.remote_host,
        ctx.path,
        ctx.session.as_deref().unwrap_or("-"),
        headers.join(", "),
        ctx.query.as_deref().unwrap_or(""),
        if body.is_empty() { "<empty>" } else { body },
    ));
}

/// Full response line, written at `trace`
pub fn log_response_trace(ctx: &RequestContext, status: u16, body: &str) {
    if !enabled(Level::Trace) {
        return;
    }

    write_info(&format!(
        "[ID: {}] Response to {} ({}), Status Code: {status}, Body: {}",
        ctx.request_id,
        ctx.remote_host,
        ctx.path,
        if body.is_empty() { "<empty>" } else { body },
    ));
}

/// Internal failures are always logged with full detail
pub fn log_internal_error(ctx: &RequestContext, err: &impl fmt::Display) {
    write_error(&format!(
        "[ERROR] [ID: {}] failed to handle API to {}: {err}",
        ctx.request_id, ctx.path
    ));
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    write_access(&entry.format(format));
}

pub fn log_shutdown() {
    write_info("\n[Shutdown] Signal received, stopping gateway");
}
