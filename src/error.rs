//! Error types and handling for Nilan Powersave
//!
//! This module defines the error types used throughout the service. None of
//! them is fatal for the running loops: callers log the error and carry on
//! with the next tick.

use crate::pricing::ParseFailure;
use thiserror::Error;

/// Result type alias for powersave operations
pub type Result<T> = std::result::Result<T, PowersaveError>;

/// Main error type for Nilan Powersave
#[derive(Debug, Error)]
pub enum PowersaveError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Modbus transport errors
    #[error("Modbus error: {message}")]
    Modbus { message: String },

    /// Device state could not be read or written
    #[error("Device I/O error: {message}")]
    DeviceIo { message: String },

    /// Price feed could not be retrieved
    #[error("Price feed error ({url}): {message}")]
    Fetch { url: String, message: String },

    /// Price feed payload could not be turned into a price table
    #[error("Price table parse error: {0}")]
    Parse(#[from] ParseFailure),

    /// A control-surface value was rejected
    #[error("Invalid value for {field}: {message}")]
    InvalidConfigValue { field: String, message: String },

    /// HTTP server errors
    #[error("Web server error: {message}")]
    Web { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl PowersaveError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new Modbus error
    pub fn modbus<S: Into<String>>(message: S) -> Self {
        Self::Modbus {
            message: message.into(),
        }
    }

    /// Create a new device I/O error
    pub fn device_io<S: Into<String>>(message: S) -> Self {
        Self::DeviceIo {
            message: message.into(),
        }
    }

    /// Create a new price feed error for `url`
    pub fn fetch<U: Into<String>, S: Into<String>>(url: U, message: S) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a new rejected-value error
    pub fn invalid_value<F: Into<String>, S: Into<String>>(field: F, message: S) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new web error
    pub fn web<S: Into<String>>(message: S) -> Self {
        Self::Web {
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Whether the error came from the transport rather than the request itself
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Modbus { .. })
    }
}

impl From<std::io::Error> for PowersaveError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for PowersaveError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<serde_json::Error> for PowersaveError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<reqwest::Error> for PowersaveError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(ToString::to_string).unwrap_or_default();
        if err.is_timeout() {
            return Self::fetch(url, format!("request timed out: {err}"));
        }
        Self::fetch(url, err.to_string())
    }
}

impl From<chrono_tz::ParseError> for PowersaveError {
    fn from(err: chrono_tz::ParseError) -> Self {
        Self::invalid_value("timezone", err.to_string())
    }
}
