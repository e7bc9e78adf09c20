// SPDX-License-Identifier: MIT

//! Typed error handling for visual-conditions
//!
//! Catalog failures are split into transport and auth kinds so callers can
//! degrade to an empty result while still reporting what went wrong.

use thiserror::Error;

/// Top-level error type for visual-conditions
#[derive(Debug, Error)]
pub enum ConditionsError {
    /// Network or protocol failure reaching the catalog
    #[error("Transport error: {0}")]
    Transport(String),

    /// Credentials or session rejected by the catalog
    #[error("Authentication rejected: {0}")]
    Auth(String),

    /// Malformed hydration input
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration errors (missing env vars, invalid values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors raised while validating a saved condition list
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    /// Operator other than include/exclude
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    /// Item identifier that is neither a non-empty string nor an integer
    #[error("Malformed item identifier in row {row}: {value}")]
    MalformedItem { row: usize, value: String },

    /// Input that does not have the shape of a condition list
    #[error("Malformed condition list: {0}")]
    Malformed(String),
}

/// Coarse classification used for diagnostics and notices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Auth,
    Validation,
    Config,
    Io,
}

impl ConditionsError {
    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Classify the error. HTTP and malformed payload errors count as transport failures.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) | Self::Http(_) | Self::Json(_) => ErrorKind::Transport,
            Self::Auth(_) => ErrorKind::Auth,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) | Self::Yaml(_) => ErrorKind::Io,
        }
    }
}
