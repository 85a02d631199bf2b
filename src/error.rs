//! Error types for the Solarman exporter.
//!
//! This module defines custom error types using `thiserror` for structured
//! error handling throughout the application.

use thiserror::Error;

/// Main error type for Solarman exporter operations.
#[derive(Debug, Error)]
pub enum SolarmanError {
    /// Transport error talking to the Solarman API
    #[error("Solarman API error: {0}")]
    Api(#[from] reqwest::Error),

    /// Solarman API answered with a non-200 status
    #[error("Solarman API returned HTTP {status} for {endpoint}")]
    Status {
        endpoint: &'static str,
        status: reqwest::StatusCode,
    },

    /// Error parsing Solarman API response
    #[error("Failed to parse Solarman API response: {0}")]
    ParseError(String),

    /// Solarman API answered 200 but flagged the request as unsuccessful
    #[error("Solarman API rejected the request (code: {code}, msg: {msg})")]
    Rejected { code: String, msg: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Metrics error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// HTTP server error
    #[error("HTTP server error: {0}")]
    Server(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<prometheus::Error> for SolarmanError {
    fn from(err: prometheus::Error) -> Self {
        SolarmanError::Metrics(err.to_string())
    }
}

/// Result type alias for Solarman operations.
pub type Result<T> = std::result::Result<T, SolarmanError>;
