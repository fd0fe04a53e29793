//! Error type shared by the chat core and its storage adapters.

use std::fmt;
use thiserror::Error;

/// Encoding of a document that failed to parse or encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Json,
    Toml,
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataFormat::Json => "JSON",
            DataFormat::Toml => "TOML",
        })
    }
}

#[derive(Error, Debug, Clone)]
pub enum ChorusError {
    /// A persona or session lookup missed.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("IO error: {message}")]
    Io { message: String },

    /// A blob store read or write failed.
    #[error("Storage error: {0}")]
    DataAccess(String),

    #[error("Invalid {format} data: {message}")]
    Serialization { format: DataFormat, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    /// Another round or session change holds the guard.
    #[error("Busy: {0}")]
    Busy(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChorusError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn data_access(message: impl Into<String>) -> Self {
        Self::DataAccess(message.into())
    }

    pub fn busy(message: impl Into<String>) -> Self {
        Self::Busy(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
}

impl From<std::io::Error> for ChorusError {
    fn from(err: std::io::Error) -> Self {
        Self::io(format!("{} ({:?})", err, err.kind()))
    }
}

impl From<serde_json::Error> for ChorusError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: DataFormat::Json,
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ChorusError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: DataFormat::Toml,
            message: err.message().to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChorusError>;
