//! Configuration error types.

use crate::error::CacheError;
use thiserror::Error;

/// Errors raised while loading or validating cache configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Invalid value for {field}: {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read configuration file {path}: {message}")]
    FileRead { path: String, message: String },

    #[error("Failed to parse configuration: {message}")]
    Parse { message: String },
}

impl ConfigurationError {
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn file_read_error(path: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::FileRead {
            path: path.into(),
            message: error.to_string(),
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(error: config::ConfigError) -> Self {
        Self::parse_error(error.to_string())
    }
}

impl From<ConfigurationError> for CacheError {
    fn from(error: ConfigurationError) -> Self {
        CacheError::configuration("config", error.to_string())
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigurationError>;
