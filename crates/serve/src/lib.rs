//! Sitepulse Serve Library
//!
//! Dashboard server for the Sitepulse analytics pipeline. Exposes the
//! tracking endpoint and the admin-gated reporting API, and hosts the
//! dashboard controller that keeps chart and table models current.

pub mod dashboard;
pub mod server;

pub use dashboard::*;
pub use server::*;

/// Server version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Default date range for reports, in days
    pub default_range_days: i64,
    /// Where a non-admin request is redirected
    pub sign_in_path: String,
    /// Active-user refresh interval in seconds
    pub active_refresh_secs: u64,
    pub cors_enabled: bool,
    pub max_request_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            default_range_days: 30,
            sign_in_path: "/signin".to_string(),
            active_refresh_secs: 30,
            cors_enabled: true,
            max_request_size: 1024 * 1024, // 1MB
        }
    }
}
