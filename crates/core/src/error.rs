//! Error handling for the Sitepulse core library

use std::fmt;
use thiserror::Error;

/// Result type alias for Sitepulse operations
pub type Result<T> = std::result::Result<T, SitepulseError>;

/// Main error type for Sitepulse operations
#[derive(Error, Debug)]
pub enum SitepulseError {
    /// IO-related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Generic errors
    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),

    /// Remote event store errors
    #[error("Store error: {message}")]
    Store { message: String },

    /// Authentication/authorization errors
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// Network connectivity errors
    #[error("Network error: {message}")]
    Network { message: String },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Resource not found errors
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    /// Permission denied errors
    #[error("Permission denied: {resource}")]
    PermissionDenied { resource: String },

    /// Invalid state errors
    #[error("Invalid state: {message}")]
    InvalidState { message: String },
}

impl SitepulseError {
    /// Create a store error
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create an auth error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a permission denied error
    pub fn permission_denied<S: Into<String>>(resource: S) -> Self {
        Self::PermissionDenied {
            resource: resource.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state<S: Into<String>>(message: S) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Http(_) | Self::Store { .. }
        )
    }

    /// Get error category for logging/metrics
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Io(_) => ErrorCategory::FileSystem,
            Self::Http(_) | Self::Network { .. } => ErrorCategory::Network,
            Self::Json(_) | Self::Yaml(_) => ErrorCategory::Serialization,
            Self::Url(_) => ErrorCategory::Url,
            Self::Store { .. } => ErrorCategory::Store,
            Self::Auth { .. } | Self::PermissionDenied { .. } => ErrorCategory::Security,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::InvalidState { .. } => ErrorCategory::State,
            Self::Generic(_) => ErrorCategory::Generic,
        }
    }
}

/// Error categories for metrics and logging
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    FileSystem,
    Network,
    Serialization,
    Url,
    Store,
    Security,
    Validation,
    NotFound,
    State,
    Generic,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileSystem => write!(f, "filesystem"),
            Self::Network => write!(f, "network"),
            Self::Serialization => write!(f, "serialization"),
            Self::Url => write!(f, "url"),
            Self::Store => write!(f, "store"),
            Self::Security => write!(f, "security"),
            Self::Validation => write!(f, "validation"),
            Self::NotFound => write!(f, "not_found"),
            Self::State => write!(f, "state"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = SitepulseError::store("test message");
        assert!(matches!(err, SitepulseError::Store { .. }));
        assert_eq!(err.to_string(), "Store error: test message");
    }

    #[test]
    fn test_error_categories() {
        let err = SitepulseError::auth("test");
        assert_eq!(err.category(), ErrorCategory::Security);

        let err = SitepulseError::network("test");
        assert_eq!(err.category(), ErrorCategory::Network);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(SitepulseError::network("test").is_retryable());
        assert!(SitepulseError::store("test").is_retryable());
        assert!(!SitepulseError::validation("test").is_retryable());
        assert!(!SitepulseError::permission_denied("test").is_retryable());
    }

    #[test]
    fn test_error_from_conversions() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SitepulseError = io_err.into();
        assert!(matches!(err, SitepulseError::Io(_)));

        let json_err = serde_json::from_str::<i32>("invalid json").unwrap_err();
        let err: SitepulseError = json_err.into();
        assert!(matches!(err, SitepulseError::Json(_)));
    }

    #[test]
    fn test_error_display() {
        let err = SitepulseError::not_found("page_views");
        assert_eq!(err.to_string(), "Resource not found: page_views");

        let err = SitepulseError::permission_denied("analytics dashboard");
        assert_eq!(err.to_string(), "Permission denied: analytics dashboard");
    }
}
