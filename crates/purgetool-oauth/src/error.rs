//! Error types for token and authorization requests.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures talking to the token, user-info or relay endpoints.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request did not complete, or the body could not be decoded.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A JSON document could not be read.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The endpoint answered with an OAuth error body.
    #[error("Token endpoint refused: {error} {description}")]
    OAuth {
        /// Error code, e.g. `invalid_grant`.
        error: String,
        /// Explanation from the server; may be empty.
        description: String,
    },

    /// The relay refused to start or finish a flow.
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// Refreshing needs a refresh token and there is none.
    #[error("No refresh token available")]
    NoRefreshToken,

    /// Refreshing needs a client id the credentials do not carry.
    #[error("Credentials carry no client id; cannot refresh")]
    NoClientId,

    /// A reply was well-formed but unusable.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The user did not finish consenting in time.
    #[error("Authorization timed out after {0} seconds")]
    Timeout(u64),

    /// An endpoint address could not be parsed.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Creates an [`Error::OAuth`].
    #[must_use]
    pub fn oauth_error(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self::OAuth {
            error: error.into(),
            description: description.into(),
        }
    }
}
