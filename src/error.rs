// src/error.rs

//! Unified error handling for the fetcher.

use std::fmt;

use thiserror::Error;

/// Result type alias for fetcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Transport-level failure (connection, DNS, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a status that is never retried
    #[error("GET {url} returned status code {status}")]
    Status { url: String, status: u16 },

    /// Upstream kept answering with a transient status
    #[error("GET {url} returned status code {status}; gave up after {attempts} attempts")]
    RetriesExhausted {
        url: String,
        status: u16,
        attempts: u32,
    },

    /// Upstream answered with an error payload instead of data
    #[error("GET {url} returned an error: {message}")]
    Upstream { url: String, message: String },

    /// The dispatcher was shut down before the request completed
    #[error("dispatcher for {host} is shut down")]
    DispatcherClosed { host: String },

    /// Rating code not part of any known scheme
    #[error("unknown rating: `{0}`")]
    UnknownRating(String),

    /// Content hash is not 32 hex characters
    #[error("invalid MD5 hash: `{0}`")]
    InvalidHash(String),

    /// Upstream timestamp could not be parsed
    #[error("invalid timestamp `{value}`: {message}")]
    Timestamp { value: String, message: String },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a timestamp parsing error.
    pub fn timestamp(value: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Timestamp {
            value: value.into(),
            message: message.to_string(),
        }
    }

    /// Whether the upstream reported that the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }

    /// Status code carried by an upstream error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } | Self::RetriesExhausted { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
