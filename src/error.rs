//! Error types for homeplate
//!
//! Provides standardized error handling across the preference stores.

use thiserror::Error;

/// Errors that can occur while reading or mutating launcher preferences
#[derive(Debug, Error)]
pub enum PrefsError {
    /// A reorder was requested with a different set of identifiers than the
    /// current order holds. Nothing was written.
    #[error("Invalid widget order: {0}")]
    InvalidOrder(String),

    /// A widget identifier is empty or contains the order delimiter
    #[error("Invalid widget identifier '{0}'")]
    InvalidIdentifier(String),

    /// A widget with the same identity is already added
    #[error("Widget '{0}' is already added")]
    DuplicateWidget(String),

    /// A persisted record could not be decoded
    #[error("Failed to decode '{key}': {message}")]
    Serialization { key: String, message: String },

    /// The backing key-value store rejected a read or write
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Result type alias for preference operations
pub type PrefsResult<T> = Result<T, PrefsError>;
