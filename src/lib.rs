use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("HTTP status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid chunk size: {0} (must be greater than zero)")]
    InvalidChunkSize(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RagError {
    /// Prefix the error message with additional context while keeping its kind
    #[inline]
    #[must_use]
    pub fn context(self, context: impl std::fmt::Display) -> Self {
        match self {
            Self::Connectivity(message) => Self::Connectivity(format!("{context}: {message}")),
            Self::Status { status, message } => Self::Status {
                status,
                message: format!("{context}: {message}"),
            },
            Self::Protocol(message) => Self::Protocol(format!("{context}: {message}")),
            Self::Other(error) => Self::Other(error.context(context.to_string())),
            other => other,
        }
    }

    #[inline]
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    #[inline]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_) | Self::Status { .. })
    }

    #[inline]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub mod config;
pub mod database;
pub mod embeddings;
pub mod generation;
pub mod http;
pub mod pipeline;
