//! Access tokens issued by a token endpoint.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::error::{Error, Result};

/// A token counts as expired this many seconds before its real expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Access token with its expiry and, when the server sent one, a refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Bearer access token.
    pub access_token: String,
    /// Refresh token, if issued.
    pub refresh_token: Option<String>,
    /// Absolute expiry. `None` means the server did not say.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Token {
    /// Creates a token with no expiry and no refresh token.
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Sets the expiry.
    #[must_use]
    pub const fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Returns true once the token is within a minute of its expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|at| Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS) >= at)
    }

    /// Returns the refresh token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRefreshToken`] if none was issued.
    pub fn refresh_token(&self) -> Result<&str> {
        self.refresh_token.as_deref().ok_or(Error::NoRefreshToken)
    }
}

/// Body of a successful token endpoint reply.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Refresh token; omitted when the server keeps the old one valid.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl TryFrom<TokenResponse> for Token {
    type Error = Error;

    fn try_from(response: TokenResponse) -> Result<Self> {
        if response.access_token.is_empty() {
            return Err(Error::InvalidResponse("token endpoint sent an empty access_token".into()));
        }
        Ok(Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: response
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
        })
    }
}

/// Body of a failed token or user-info reply.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointError {
    /// Error code, e.g. `invalid_grant`.
    pub error: String,
    /// Explanation, if the server gave one.
    #[serde(default)]
    pub error_description: Option<String>,
}

impl EndpointError {
    /// Converts into [`Error::OAuth`].
    #[must_use]
    pub fn into_error(self) -> Error {
        Error::oauth_error(self.error, self.error_description.unwrap_or_default())
    }
}
