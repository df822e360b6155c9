//! Error types for Playbridge Core

use crate::types::{PlayerState, SessionId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Bridge error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Missing argument: {0}")]
    MissingArgument(String),

    #[error("Invalid argument `{name}`: {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Source errors
    #[error("Unsupported source type: {0}")]
    UnsupportedSourceType(String),

    // Session errors
    #[error("No video player associated with texture id {0}")]
    SessionNotFound(SessionId),

    #[error("Session {id} is not ready (state: {state})")]
    NotReady { id: SessionId, state: PlayerState },

    #[error("Invalid playback state transition: {from} -> {to}")]
    InvalidStateTransition { from: PlayerState, to: PlayerState },

    #[error("Cannot {operation} in state {state}")]
    InvalidOperation {
        operation: &'static str,
        state: PlayerState,
    },

    #[error("Session {0} has been disposed")]
    Disposed(SessionId),

    // Collaborator errors
    #[error("Playback engine error: {0}")]
    Engine(String),

    #[error("Render target error: {0}")]
    RenderTarget(String),

    #[error("Event delivery failed: {0}")]
    Delivery(String),

    // Command surface
    #[error("Method not implemented: {0}")]
    NotImplemented(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an invalid-argument error
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a playback engine error
    pub fn engine(msg: impl Into<String>) -> Self {
        Error::Engine(msg.into())
    }

    /// Returns true for missing or malformed command parameters.
    /// These are reported before any session is touched.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::MissingArgument(_)
                | Error::InvalidArgument { .. }
                | Error::InvalidLocator(_)
                | Error::InvalidConfig(_)
        )
    }

    /// Returns the error code reported to the host
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::MissingArgument(_)
            | Error::InvalidArgument { .. }
            | Error::InvalidLocator(_)
            | Error::InvalidConfig(_) => "CONFIGURATION_ERROR",
            Error::UnsupportedSourceType(_) => "UNSUPPORTED_SOURCE_TYPE",
            Error::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Error::NotReady { .. } => "NOT_READY",
            Error::InvalidStateTransition { .. } | Error::InvalidOperation { .. } => {
                "INVALID_STATE"
            }
            Error::Disposed(_) => "SESSION_DISPOSED",
            Error::Engine(_) => "PLAYBACK_ENGINE_ERROR",
            Error::RenderTarget(_) => "RENDER_TARGET_ERROR",
            Error::Delivery(_) => "DELIVERY_FAILED",
            Error::NotImplemented(_) => "NOT_IMPLEMENTED",
            Error::Network(_) => "NETWORK",
            Error::Json(_) => "JSON",
            Error::Io(_) => "IO",
        }
    }
}

/// Synchronous command failure as seen by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandError {
    pub code: String,
    pub message: String,
}

impl CommandError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<Error> for CommandError {
    fn from(err: Error) -> Self {
        Self {
            code: err.error_code().to_string(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CommandError {}
