//! Error types for launchkit.
//!
//! Every failure a plugin can hit maps onto one of these variants. None of them
//! is fatal to a plugin instance: query handlers render them as informational
//! items and background tasks log them.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for launchkit.
#[derive(Debug, Error)]
pub enum LaunchkitError {
    // Remote service errors
    #[error("Got response {status} querying {url}")]
    Remote { status: u16, url: String },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Pagination for {url} exceeded {max_pages} pages")]
    PaginationLimit { url: String, max_pages: u32 },

    // Cache errors
    #[error("Cache file {path:?} is unreadable: {message}")]
    CacheCorruption { path: PathBuf, message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Host interaction errors
    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),

    #[error("Unknown action {action} for plugin {plugin}")]
    UnknownAction { plugin: String, action: String },

    #[error("Invalid parameters: {message}")]
    InvalidParams { message: String },

    // Subprocess errors
    #[error("Command `{command}` failed: {message}")]
    Command { command: String, message: String },

    #[error("Operation was cancelled")]
    Cancelled,

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for launchkit operations.
pub type Result<T> = std::result::Result<T, LaunchkitError>;

impl From<std::io::Error> for LaunchkitError {
    fn from(err: std::io::Error) -> Self {
        LaunchkitError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for LaunchkitError {
    fn from(err: serde_json::Error) -> Self {
        LaunchkitError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for LaunchkitError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LaunchkitError::Timeout(crate::config::NetworkConfig::REQUEST_TIMEOUT)
        } else if let Some(status) = err.status() {
            LaunchkitError::Remote {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else {
            LaunchkitError::Network {
                message: err.to_string(),
                source: Some(err),
            }
        }
    }
}

impl LaunchkitError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        LaunchkitError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Custom error codes (application-defined, -32000 to -32099):
    /// - -32000: Remote service / connectivity error
    /// - -32001: Unknown plugin
    /// - -32002: Unknown action
    /// - -32004: Cancelled
    /// - -32005: Validation / configuration error
    /// - -32602: Invalid params
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            LaunchkitError::Remote { .. }
            | LaunchkitError::Network { .. }
            | LaunchkitError::Timeout(_)
            | LaunchkitError::PaginationLimit { .. } => -32000,

            LaunchkitError::UnknownPlugin(_) => -32001,
            LaunchkitError::UnknownAction { .. } => -32002,
            LaunchkitError::Cancelled => -32004,

            LaunchkitError::Validation { .. } | LaunchkitError::Config { .. } => -32005,

            LaunchkitError::InvalidParams { .. } => -32602,

            _ => -32603,
        }
    }

    /// Check if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            LaunchkitError::Network { .. } | LaunchkitError::Timeout(_) => true,
            LaunchkitError::Remote { status, .. } => {
                matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }

    /// Short text suitable for an informational result item.
    pub fn user_message(&self) -> String {
        match self {
            LaunchkitError::Remote { status, .. } => format!("Got response {}", status),
            LaunchkitError::Timeout(_) => "Request timed out".to_string(),
            LaunchkitError::Network { .. } => "Could not reach the server".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LaunchkitError::Remote {
            status: 500,
            url: "http://localhost:9090/api/bookmarks/".into(),
        };
        assert_eq!(
            err.to_string(),
            "Got response 500 querying http://localhost:9090/api/bookmarks/"
        );
        assert_eq!(err.user_message(), "Got response 500");
    }

    #[test]
    fn test_rpc_error_codes() {
        assert_eq!(
            LaunchkitError::UnknownPlugin("nope".into()).to_rpc_error_code(),
            -32001
        );
        assert_eq!(LaunchkitError::Cancelled.to_rpc_error_code(), -32004);
        assert_eq!(
            LaunchkitError::Other("boom".into()).to_rpc_error_code(),
            -32603
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(LaunchkitError::Timeout(std::time::Duration::from_secs(5)).is_retryable());
        assert!(LaunchkitError::Remote {
            status: 503,
            url: String::new()
        }
        .is_retryable());
        assert!(!LaunchkitError::Remote {
            status: 404,
            url: String::new()
        }
        .is_retryable());
        assert!(!LaunchkitError::Cancelled.is_retryable());
    }
}
