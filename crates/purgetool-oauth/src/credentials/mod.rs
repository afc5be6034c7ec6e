//! Persistable authorized-user credentials.
//!
//! This is the secret material an OAuth-backed session serializes. The expiry
//! is stored as milliseconds since the Unix epoch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::token::Token;

/// Authorized-user credentials: an access token plus what is needed to renew it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Access token.
    pub token: String,
    /// Refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute expiry of the access token.
    #[serde(
        default,
        rename = "expiry",
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<DateTime<Utc>>,
    /// OAuth client id the refresh token was issued to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// OAuth client secret, for confidential clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Granted scopes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

impl Credentials {
    /// Creates credentials holding only an access token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            refresh_token: None,
            expires_at: None,
            client_id: None,
            client_secret: None,
            scopes: Vec::new(),
        }
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Sets the expiry from milliseconds since the Unix epoch.
    #[must_use]
    pub fn with_expiry_millis(mut self, millis: i64) -> Self {
        self.expires_at = DateTime::from_timestamp_millis(millis);
        self
    }

    /// Sets the OAuth client the credentials belong to.
    #[must_use]
    pub fn with_client(mut self, client_id: impl Into<String>, client_secret: Option<String>) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = client_secret;
        self
    }

    /// Returns the access token as a [`Token`].
    #[must_use]
    pub fn to_token(&self) -> Token {
        Token {
            access_token: self.token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at: self.expires_at,
        }
    }

    /// Replaces the access token and expiry with a freshly issued token.
    ///
    /// The refresh token is kept unless the server rotated it.
    pub fn apply(&mut self, token: Token) {
        self.token = token.access_token;
        self.expires_at = token.expires_at;
        if token.refresh_token.is_some() {
            self.refresh_token = token.refresh_token;
        }
    }

    /// Returns true if the access token is expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.to_token().is_expired()
    }

    /// Returns true if there is a usable access token.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.token.is_empty() && !self.is_expired()
    }

    /// Returns true if the access token can be renewed.
    #[must_use]
    pub const fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() && self.client_id.is_some()
    }
}
