//! Identity provider endpoints.

use url::Url;

use crate::error::Result;

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Scopes requested for Gmail: full IMAP access plus the account address.
const GOOGLE_SCOPES: [&str; 4] = [
    "openid",
    "https://mail.google.com/",
    "https://www.googleapis.com/auth/userinfo.profile",
    "https://www.googleapis.com/auth/userinfo.email",
];

/// Where to refresh tokens and look up the signed-in account.
#[derive(Debug, Clone)]
pub struct Provider {
    /// Display name.
    pub name: String,
    /// Token endpoint.
    pub token_url: Url,
    /// User-info endpoint returning the account's email address.
    pub userinfo_url: Url,
    /// Scopes requested when authorizing.
    pub default_scopes: Vec<String>,
}

impl Provider {
    /// Creates a provider with no default scopes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`](crate::Error::Url) if either endpoint is not a URL.
    pub fn new(name: impl Into<String>, token_url: &str, userinfo_url: &str) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            token_url: Url::parse(token_url)?,
            userinfo_url: Url::parse(userinfo_url)?,
            default_scopes: Vec::new(),
        })
    }

    /// Google, with the Gmail scopes.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the endpoints are constants.
    pub fn google() -> Result<Self> {
        let mut provider = Self::new("Google", GOOGLE_TOKEN_URL, GOOGLE_USERINFO_URL)?;
        provider.default_scopes = GOOGLE_SCOPES.iter().map(ToString::to_string).collect();
        Ok(provider)
    }
}
