// Configuration module entry point
// Loads the gateway configuration and holds the shared application state

mod state;
mod types;

use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

pub use state::AppState;
pub use types::{Config, GatewayConfig, LoggingConfig, PerformanceConfig, ServerConfig};

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("GATEWAY")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.backlog", 128)?
            .set_default("gateway.api_version", "/v1")?
            .set_default("gateway.async_job_path", "/api-jobs")?
            .set_default("gateway.base_url", "http://127.0.0.1:8080")?
            .set_default("gateway.schema_header", "X-JSON-Schema")?
            .set_default("gateway.job_expiry_secs", 86_400)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("performance.max_body_size", 10_485_760)? // 10MB
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        self.base_url()?;
        if !self.gateway.api_version.starts_with('/') {
            return Err(config::ConfigError::Message(format!(
                "gateway.api_version must start with '/': {}",
                self.gateway.api_version
            )));
        }
        if !self.gateway.async_job_path.starts_with('/') {
            return Err(config::ConfigError::Message(format!(
                "gateway.async_job_path must start with '/': {}",
                self.gateway.async_job_path
            )));
        }
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    pub fn base_url(&self) -> Result<Url, config::ConfigError> {
        Url::parse(&self.gateway.base_url).map_err(|e| {
            config::ConfigError::Message(format!(
                "invalid gateway.base_url {}: {e}",
                self.gateway.base_url
            ))
        })
    }

    pub const fn job_expiry(&self) -> Duration {
        Duration::from_secs(self.gateway.job_expiry_secs)
    }
}
