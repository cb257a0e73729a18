//! Error types for blinc_loadable

use thiserror::Error;

/// Why a loadable failed to sync
///
/// The message is meant for logs and debugging, not for end users. When the
/// UI needs to tell different failures apart it should look at [`code`],
/// which the sync implementation is free to define.
///
/// [`code`]: SyncError::code
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SyncError {
    message: String,
    code: Option<i64>,
}

impl SyncError {
    /// Create an error with a message and no code
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Create an error with a domain-specific code
    pub fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }

    /// Capture any error, keeping only its message
    pub fn from_error(err: &dyn std::error::Error) -> Self {
        Self::new(err.to_string())
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> Option<i64> {
        self.code
    }
}

impl From<&str> for SyncError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for SyncError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Errors raised while setting up loadables
#[derive(Error, Debug)]
pub enum LoadableError {
    /// Autosync configuration could not be parsed
    #[error("Invalid autosync configuration: {0}")]
    Config(String),
}

/// Result type for blinc_loadable operations
pub type Result<T> = std::result::Result<T, LoadableError>;
