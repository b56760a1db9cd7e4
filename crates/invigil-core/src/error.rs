//! Error types for invigil-core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::SessionStatus;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for invigil-core.
#[derive(Error, Debug)]
pub enum Error {
    /// Session lifecycle and ownership errors.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration errors.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed client input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Collaborator (attempt/identity store) failures.
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Runtime errors (channel failures, task join failures).
    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Session lifecycle and ownership errors.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The attempt does not resolve via the attempt directory.
    #[error("Attempt not found: {0}")]
    AttemptNotFound(String),

    /// No session with the given id.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// No violation with the given id on the session.
    #[error("Violation not found: {0}")]
    ViolationNotFound(String),

    /// Caller does not own the attempt or session.
    #[error("Caller {caller_id} does not own {resource}")]
    NotOwner { caller_id: String, resource: String },

    /// Caller already holds an active session.
    #[error("User already has an active proctoring session: {session_id}")]
    AlreadyActive { session_id: String },

    /// The session has left the active state and rejects mutation.
    #[error("Session {session_id} is {status}, not active")]
    NotActive {
        session_id: String,
        status: SessionStatus,
    },
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("Failed to read config file {path}: {reason}")]
    ReadFailed { path: String, reason: String },

    /// Failed to parse a config file.
    #[error("Failed to parse config: {0}")]
    ParseFailed(String),

    /// A config field holds a degenerate value.
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}

/// Coarse classification for transport layers mapping errors onto
/// status codes. The core never maps to HTTP itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Attempt, session, or violation missing.
    NotFound,
    /// Caller does not own the resource.
    Forbidden,
    /// The operation conflicts with current state (second active
    /// session, mutation of a terminal session).
    Conflict,
    /// Malformed input or configuration.
    Invalid,
    /// Everything else.
    Internal,
}

impl Error {
    /// Classify this error for a transport layer.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Session(err) => match err {
                SessionError::AttemptNotFound(_)
                | SessionError::SessionNotFound(_)
                | SessionError::ViolationNotFound(_) => ErrorKind::NotFound,
                SessionError::NotOwner { .. } => ErrorKind::Forbidden,
                SessionError::AlreadyActive { .. } | SessionError::NotActive { .. } => {
                    ErrorKind::Conflict
                }
            },
            Self::Config(_) | Self::Validation(_) => ErrorKind::Invalid,
            Self::Collaborator(_) | Self::Io(_) | Self::Json(_) | Self::Runtime(_) => {
                ErrorKind::Internal
            }
        }
    }
}
