//! Error types for the plugin registry
//!
//! This module defines the error type shared by the registry client, the
//! patch loader and the output writer. Uses `thiserror` for ergonomic error
//! handling with automatic `Display` and `Error` trait implementations.
//!
//! Only failures of the npm registry (the authoritative data source) and
//! local I/O are meant to reach the caller as `Err`. Third-party metadata and
//! curator patches degrade to warnings instead.

use thiserror::Error;

/// The primary error type for plugin registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Configuration-related errors (invalid config file, bad values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A registry request returned a non-success HTTP status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// A registry operation ran out of retry attempts.
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<RegistryError>,
    },

    /// The request queue was closed while a request waited for admission.
    #[error("Request queue error: {0}")]
    Queue(String),

    /// Resource not found (data files, packages, etc.)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Document failed schema validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl RegistryError {
    /// HTTP status carried by this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            RegistryError::Status { status, .. } => Some(*status),
            RegistryError::Http(e) => e.status().map(|s| s.as_u16()),
            RegistryError::RetriesExhausted { source, .. } => source.status(),
            _ => None,
        }
    }
}

/// A specialized `Result` type for plugin registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistryError::Config("registry url is empty".to_string());
        assert_eq!(err.to_string(), "Configuration error: registry url is empty");
    }

    #[test]
    fn test_status_display() {
        let err = RegistryError::Status {
            status: 503,
            url: "https://registry.npmjs.org/vite".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503 from https://registry.npmjs.org/vite");
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn test_retries_exhausted_names_operation() {
        let err = RegistryError::RetriesExhausted {
            operation: "search keywords:vite-plugin (from=250)".to_string(),
            attempts: 100,
            source: Box::new(RegistryError::Status {
                status: 500,
                url: "https://registry.npmjs.org/-/v1/search".to_string(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("search keywords:vite-plugin (from=250)"));
        assert!(msg.contains("100 attempts"));
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RegistryError = io_err.into();
        assert!(matches!(err, RegistryError::Io(_)));
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_result_type() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }
}
