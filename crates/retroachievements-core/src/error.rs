//! Core error types for retroachievements-core.
//!
//! Only [`CoreError::UnsupportedApp`] and configuration loading are meant to
//! reach the host. Everything raised while polling is logged and swallowed by
//! the reporter.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for retroachievements-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The session's application was not identified by a supported identifier.
    #[error("Unsupported application: {0}")]
    UnsupportedApp(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// RetroAchievements API errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Persisted state errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A notification service or the host rejected a status update
    #[error("Delivery to '{target}' failed: {message}")]
    Delivery { target: String, message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Errors raised while talking to the RetroAchievements web API.
#[derive(Error, Debug)]
pub enum ApiError {
    /// User name or API key not configured
    #[error("RetroAchievements credentials not configured")]
    MissingCredentials,

    /// Base URL or endpoint could not be assembled
    #[error("Invalid API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Transport-level failure
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Response body did not match the expected shape
    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Errors raised by the per-session state store.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Reading or writing the state file failed
    #[error("State file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// State file contents could not be (de)serialized
    #[error("State file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
