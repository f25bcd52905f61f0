//! Error types for the dispwatch library.
//!
//! The dashboard operations themselves never fail; errors come from loading
//! configuration and writing exports.

use thiserror::Error;

/// Errors surfaced by configuration loading and export.
#[derive(Debug, Error)]
pub enum DispwatchError {
    /// Configuration source could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    /// A configuration value is out of range.
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    /// Filesystem error while writing an export.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to encode JSON.
    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DispwatchError>;
