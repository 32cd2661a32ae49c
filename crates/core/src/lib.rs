//! Sitepulse Core Library
//!
//! Core functionality for the Sitepulse visitor analytics pipeline.
//! This library provides session identity, page-view recording,
//! navigation change detection, analytics aggregation, and the clients
//! for the hosted backend's auth and content APIs.

pub mod aggregator;
pub mod auth;
pub mod config;
pub mod content;
pub mod error;
pub mod navigation;
pub mod recorder;
pub mod session;
pub mod store;
pub mod types;
pub mod ua;

// Re-export commonly used types
pub use aggregator::{
    AggregatorConfig, AnalyticsAggregator, AnalyticsSnapshot, DailyPoint, DeviceSlice, PageStats,
    ReferrerStats,
};
pub use auth::{AuthClient, AuthEvent, AuthSession, AuthUser, Profile};
pub use config::SitepulseConfig;
pub use content::{BlogPost, ContactForm, ContentClient, PortfolioItem, Service};
pub use error::{Result, SitepulseError};
pub use navigation::{NavigationSource, RouteEvents, Tracker, UrlChangeDetector};
pub use recorder::{build_event, record_event, PageViewRecorder};
pub use session::{FileKv, KeyValueStore, MemoryKv, SessionStore, Theme};
pub use store::{
    readiness, EventQuery, EventStore, MemoryStore, Readiness, ReadinessSignal, RestStore,
    RestStoreConfig, SortOrder,
};
pub use types::{DeviceType, PageContext, PageViewEvent, ScreenSize, VisitorSessionRecord};
pub use ua::{classify_browser, classify_device};

/// Initialize logging with JSON formatting
pub fn init_logging() -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sitepulse_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    Ok(())
}

/// Initialize logging with custom configuration
pub fn init_logging_with_config(level: &str, format: &str) -> Result<()> {
    use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = tracing_subscriber::EnvFilter::new(level);

    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        "text" | "pretty" => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_span_events(FmtSpan::CLOSE),
                )
                .init();
        }
        "compact" => {
            registry
                .with(tracing_subscriber::fmt::layer().compact())
                .init();
        }
        _ => {
            return Err(SitepulseError::validation(format!(
                "Unknown log format: {}",
                format
            )));
        }
    }

    Ok(())
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get version info as a formatted string
pub fn version_info() -> String {
    format!("{} v{} - {}", NAME, VERSION, DESCRIPTION)
}

/// Health check function
pub fn health_check() -> std::result::Result<(), String> {
    // Basic health checks
    if std::env::var("HOME").is_err() && std::env::var("USERPROFILE").is_err() {
        return Err("No home directory found".to_string());
    }

    // Check if we can create temporary files
    if let Err(e) = tempfile::tempfile() {
        return Err(format!("Cannot create temporary files: {}", e));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert!(info.contains(NAME));
        assert!(info.contains(VERSION));
    }

    #[test]
    fn test_health_check() {
        assert!(health_check().is_ok());
    }
}
