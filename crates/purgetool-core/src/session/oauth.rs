//! OAuth-backed session authenticating with XOAUTH2.

use purgetool_imap::{Endpoint, SaslExchange};
use purgetool_oauth::Credentials;
use purgetool_oauth::sasl::{parse_oauth_error, xoauth2_payload};
use serde_json::Value;
use tracing::{debug, warn};

use super::link::Link;
use super::{AuthState, SessionContext};
use crate::Result;

/// IMAP host for Gmail accounts.
pub const GMAIL_HOST: &str = "imap.gmail.com";

/// SASL mechanism used for bearer tokens.
const MECHANISM: &str = "XOAUTH2";

/// Session authenticated by an `OAuth2` access token.
pub struct OAuthSession {
    user: String,
    credentials: Credentials,
    link: Link,
}

impl OAuthSession {
    /// Connects to Gmail for a resolved user.
    ///
    /// # Errors
    ///
    /// Returns an operation error naming the host if it cannot be reached.
    pub fn connect(user: impl Into<String>, credentials: Credentials, ctx: &SessionContext) -> Result<Self> {
        let link = Link::open(ctx, &Endpoint::new(GMAIL_HOST))?;
        Ok(Self {
            user: user.into(),
            credentials,
            link,
        })
    }

    /// Builds a session from freshly granted credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the user-info lookup fails or Gmail cannot be reached.
    pub fn authorize(credentials: Credentials, ctx: &SessionContext) -> Result<Self> {
        let user = ctx.authority.user_email(&credentials)?;
        Self::connect(user, credentials, ctx)
    }

    /// Rebuilds a session from serialized credentials.
    ///
    /// Returns `Ok(None)` when the credentials are unusable and cannot be refreshed,
    /// or when the account address cannot be resolved.
    ///
    /// # Errors
    ///
    /// Returns an operation error if Gmail cannot be reached.
    pub fn build(data: &Value, ctx: &SessionContext) -> Result<Option<Self>> {
        let mut credentials: Credentials = match serde_json::from_value(data.clone()) {
            Ok(credentials) => credentials,
            Err(err) => {
                warn!("Could not construct credentials: {err}");
                return Ok(None);
            }
        };

        if !credentials.is_valid() {
            if credentials.is_expired() && credentials.refresh_token.is_some() {
                if let Err(err) = ctx.authority.refresh(&mut credentials) {
                    warn!("Could not refresh access token: {err}");
                    return Ok(None);
                }
            } else {
                debug!("Stored credentials are unusable and cannot be refreshed");
                return Ok(None);
            }
        }

        let user = match ctx.authority.user_email(&credentials) {
            Ok(user) => user,
            Err(err) => {
                warn!("Could not resolve account address: {err}");
                return Ok(None);
            }
        };

        Self::connect(user, credentials, ctx).map(Some)
    }

    /// Account address.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Current credentials, possibly refreshed during [`build`](Self::build).
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub(crate) const fn state(&self) -> AuthState {
        self.link.state()
    }

    pub(crate) fn authenticate(&mut self) -> Result<()> {
        let exchange = BearerExchange {
            user: &self.user,
            token: &self.credentials.token,
        };
        self.link
            .authenticate(|connection| connection.authenticate(MECHANISM, &exchange))
    }

    pub(crate) fn logout(&mut self) -> Result<()> {
        self.link.logout()
    }

    pub(crate) fn serialize(&self) -> Result<Value> {
        Ok(serde_json::to_value(&self.credentials)?)
    }

    pub(crate) fn link(&mut self) -> &mut Link {
        &mut self.link
    }
}

/// XOAUTH2 client side: one initial response, then an empty reply to any error challenge.
pub(crate) struct BearerExchange<'a> {
    pub(crate) user: &'a str,
    pub(crate) token: &'a str,
}

impl SaslExchange for BearerExchange<'_> {
    fn respond(&self, challenge: &[u8]) -> Vec<u8> {
        if challenge.is_empty() {
            return xoauth2_payload(self.user, self.token).into_bytes();
        }

        match parse_oauth_error(challenge) {
            Ok(error) => warn!(status = %error.status, "XOAUTH2 rejected"),
            Err(_) => warn!("XOAUTH2 rejected with an unreadable challenge"),
        }
        Vec::new()
    }
}
