// Application state module
// Read-only configuration plus the gateway shared by every connection

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use super::types::Config;
use crate::gateway::Gateway;

/// Application state
pub struct AppState {
    pub config: Config,
    pub gateway: Arc<Gateway>,
    /// Open connections, checked against `performance.max_connections`
    pub active_connections: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(config: Config, gateway: Gateway) -> Self {
        Self {
            config,
            gateway: Arc::new(gateway),
            active_connections: Arc::new(AtomicU64::new(0)),
        }
    }
}
