//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Operation is invalid in the session's current authentication state.
    #[error("State error: {0}")]
    State(String),

    /// A mailbox transaction step failed or a connection could not be established.
    #[error("{0}")]
    Operation(String),

    /// A query against the mailbox failed.
    #[error("{0}")]
    Service(String),

    /// Persisted data is structurally invalid or references something unknown.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The config's active id does not match any stored account.
    #[error("Configuration error: active account '{0}' is not in the account list")]
    UnknownAccount(String),

    /// Cache key contains characters outside `[A-Za-z0-9_-]`.
    #[error("Invalid cache key '{0}': keys must contain only alphanumeric characters, underscores, and hyphens")]
    InvalidKey(String),

    /// `OAuth2` request failed.
    #[error("OAuth error: {0}")]
    OAuth(#[from] purgetool_oauth::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true for errors the user should see as an operation failure.
    #[must_use]
    pub const fn is_operation(&self) -> bool {
        matches!(self, Self::Operation(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
