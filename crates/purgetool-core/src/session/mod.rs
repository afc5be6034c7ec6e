//! Mailbox sessions.
//!
//! A [`Session`] owns one connection, its authentication state and the secret
//! needed to rebuild it later. Two variants exist:
//!
//! - [`OAuthSession`]: Gmail over XOAUTH2
//! - [`CredentialSession`]: any server over LOGIN
//!
//! ```text
//! Unauthenticated ──authenticate()──→ Authenticated ──logout()──→ (spent)
//! ```
//!
//! Mailbox operations require `Authenticated`; anything else is a state error.

mod authority;
mod credential;
mod link;
mod oauth;

use std::fmt;
use std::sync::Arc;

use purgetool_imap::{Connector, Protocol, TlsConnector};
use serde_json::Value;

pub use authority::{GoogleAuthority, TokenAuthority};
pub use credential::CredentialSession;
pub use oauth::{GMAIL_HOST, OAuthSession};

use crate::Result;
use crate::registry::SessionKind;

/// Authentication state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Connected but not authenticated, or logged out.
    Unauthenticated,
    /// Authenticated; mailbox operations are allowed.
    Authenticated,
}

/// Collaborators needed to construct sessions.
#[derive(Clone)]
pub struct SessionContext {
    /// Opens connections.
    pub connector: Arc<dyn Connector>,
    /// Refreshes tokens and resolves account addresses.
    pub authority: Arc<dyn TokenAuthority>,
    /// Whether protocol tracing was requested.
    pub debug: bool,
}

impl SessionContext {
    /// Creates a context from explicit collaborators.
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>, authority: Arc<dyn TokenAuthority>) -> Self {
        Self {
            connector,
            authority,
            debug: false,
        }
    }

    /// Creates a context talking to real servers.
    ///
    /// With `debug` set, the IMAP client library traces every exchange.
    #[must_use]
    pub fn live(authority: GoogleAuthority, debug: bool) -> Self {
        Self {
            connector: Arc::new(TlsConnector::new().with_debug(debug)),
            authority: Arc::new(authority),
            debug,
        }
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

/// One authenticated connection to a mailbox plus the data needed to rebuild it.
pub enum Session {
    /// OAuth-backed Gmail session.
    OAuth(OAuthSession),
    /// Username/password session.
    Credential(CredentialSession),
}

impl Session {
    /// Reconstructs a session of the given kind from its serialized data.
    ///
    /// `Ok(None)` means the data cannot produce a session (missing fields,
    /// unrefreshable token, unknown account).
    ///
    /// # Errors
    ///
    /// Returns an operation error if the server cannot be reached.
    pub fn build(kind: SessionKind, data: &Value, ctx: &SessionContext) -> Result<Option<Self>> {
        Ok(match kind {
            SessionKind::OAuth => OAuthSession::build(data, ctx)?.map(Self::OAuth),
            SessionKind::Credential => CredentialSession::build(data, ctx)?.map(Self::Credential),
        })
    }

    /// Variant of this session.
    #[must_use]
    pub const fn kind(&self) -> SessionKind {
        match self {
            Self::OAuth(_) => SessionKind::OAuth,
            Self::Credential(_) => SessionKind::Credential,
        }
    }

    /// Account address.
    #[must_use]
    pub fn user(&self) -> &str {
        match self {
            Self::OAuth(session) => session.user(),
            Self::Credential(session) => session.user(),
        }
    }

    /// Current authentication state.
    #[must_use]
    pub const fn state(&self) -> AuthState {
        match self {
            Self::OAuth(session) => session.state(),
            Self::Credential(session) => session.state(),
        }
    }

    /// Returns true if mailbox operations are allowed.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.state(), AuthState::Authenticated)
    }

    /// Authenticates the connection.
    ///
    /// # Errors
    ///
    /// Returns a state error if already authenticated or logged out, and an
    /// operation error if the server refuses.
    pub fn authenticate(&mut self) -> Result<()> {
        match self {
            Self::OAuth(session) => session.authenticate(),
            Self::Credential(session) => session.authenticate(),
        }
    }

    /// Logs out. The session cannot be authenticated again afterwards.
    ///
    /// # Errors
    ///
    /// Returns a state error if not authenticated.
    pub fn logout(&mut self) -> Result<()> {
        match self {
            Self::OAuth(session) => session.logout(),
            Self::Credential(session) => session.logout(),
        }
    }

    /// Returns the data [`Session::build`] needs to reconstruct this session.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret cannot be serialized.
    pub fn serialize(&self) -> Result<Value> {
        match self {
            Self::OAuth(session) => session.serialize(),
            Self::Credential(session) => session.serialize(),
        }
    }

    /// The authenticated connection.
    pub(crate) fn protocol(&mut self) -> Result<&mut dyn Protocol> {
        match self {
            Self::OAuth(session) => session.link().protocol(),
            Self::Credential(session) => session.link().protocol(),
        }
    }
}

impl From<OAuthSession> for Session {
    fn from(session: OAuthSession) -> Self {
        Self::OAuth(session)
    }
}

impl From<CredentialSession> for Session {
    fn from(session: CredentialSession) -> Self {
        Self::Credential(session)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("kind", &self.kind())
            .field("user", &self.user())
            .field("state", &self.state())
            .finish()
    }
}
