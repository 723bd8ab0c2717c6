//! Error types for Haulscope

use thiserror::Error;

use crate::models::Role;

/// Result type alias using Haulscope's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Haulscope operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("{0}")]
    Validation(String),

    /// Authentication error
    #[error("{0}")]
    Auth(String),

    /// The caller's role may not see the requested report or entity
    #[error("permission denied")]
    PermissionDenied,

    /// Not found error
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of thing looked up, e.g. `trip`
        entity: String,
        /// Identifier as requested
        id: String,
    },

    /// The role has no data-visibility mapping
    #[error("no scope is defined for role {0}")]
    ScopeUnsupported(Role),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
