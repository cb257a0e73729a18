//! Hub error types

use thiserror::Error;

/// Misuse of an observer hub.
///
/// These are programmer errors: the registration set is never modified when
/// one of them is reported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// The observer is already registered with the hub
    #[error("observer is already registered with hub '{hub}'")]
    AlreadyRegistered { hub: String },

    /// The observer is not registered with the hub
    #[error("observer is not registered with hub '{hub}'")]
    NotRegistered { hub: String },
}

/// Result type for hub operations
pub type Result<T> = std::result::Result<T, HubError>;
