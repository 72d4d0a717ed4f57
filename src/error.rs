//! Error types for securemail

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Same message for an unknown email and a wrong password.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Password hashing error: {0}")]
    Hash(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tag reported to callers alongside a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    Unauthorized,
    Conflict,
    NotFound,
    InvalidCredentials,
    Internal,
}

impl Error {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidCredentials => ErrorKind::InvalidCredentials,
            Self::Config(_) | Self::Hash(_) | Self::Io(_) | Self::Json(_) => ErrorKind::Internal,
        }
    }
}

impl From<bcrypt::BcryptError> for Error {
    fn from(e: bcrypt::BcryptError) -> Self {
        Self::Hash(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
