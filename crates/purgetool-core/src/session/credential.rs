//! Session authenticated with a plain username and password.

use purgetool_imap::{Endpoint, IMAPS_PORT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::link::Link;
use super::{AuthState, SessionContext};
use crate::Result;

/// Persisted form of a credential session.
#[derive(Debug, Serialize, Deserialize)]
struct CredentialData {
    user: String,
    password: String,
    host: String,
    #[serde(default = "default_port")]
    port: u16,
}

const fn default_port() -> u16 {
    IMAPS_PORT
}

/// Session that logs in with LOGIN.
pub struct CredentialSession {
    user: String,
    password: String,
    host: String,
    port: u16,
    link: Link,
}

impl CredentialSession {
    /// Connects to the server.
    ///
    /// # Errors
    ///
    /// Returns an operation error naming the host if it cannot be reached.
    pub fn connect(
        user: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        ctx: &SessionContext,
    ) -> Result<Self> {
        let host = host.into();
        let link = Link::open(ctx, &Endpoint::new(host.clone()).with_port(port))?;
        Ok(Self {
            user: user.into(),
            password: password.into(),
            host,
            port,
            link,
        })
    }

    /// Rebuilds a session from `{user, password, host, port?}`.
    ///
    /// A missing field yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an operation error if the host cannot be reached.
    pub fn build(data: &Value, ctx: &SessionContext) -> Result<Option<Self>> {
        let data: CredentialData = match serde_json::from_value(data.clone()) {
            Ok(data) => data,
            Err(err) => {
                warn!("Incomplete credential session data: {err}");
                return Ok(None);
            }
        };

        Self::connect(data.user, data.password, data.host, data.port, ctx).map(Some)
    }

    /// Login name, also the account address.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Server host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    pub(crate) const fn state(&self) -> AuthState {
        self.link.state()
    }

    pub(crate) fn authenticate(&mut self) -> Result<()> {
        let (user, password) = (&self.user, &self.password);
        self.link
            .authenticate(|connection| connection.login(user, password))
    }

    pub(crate) fn logout(&mut self) -> Result<()> {
        self.link.logout()
    }

    pub(crate) fn serialize(&self) -> Result<Value> {
        Ok(serde_json::to_value(CredentialData {
            user: self.user.clone(),
            password: self.password.clone(),
            host: self.host.clone(),
            port: self.port,
        })?)
    }

    pub(crate) fn link(&mut self) -> &mut Link {
        &mut self.link
    }
}
