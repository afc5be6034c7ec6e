//! Connection handle and the authentication state it implies.

use purgetool_imap::{Connection, Endpoint, Protocol, Rejected};
use tracing::{debug, info, warn};

use super::{AuthState, SessionContext};
use crate::{Error, Result};

const NOT_AUTHENTICATED: &str = "Must be authenticated first.";

/// The one live connection a session owns.
pub(crate) enum Link {
    /// Greeted, not yet authenticated.
    Connected(Box<dyn Connection>),
    /// Authenticated; mailbox operations are allowed.
    Authenticated(Box<dyn Protocol>),
    /// Logged out. The session cannot be reused.
    Detached,
}

impl Link {
    /// Connects to the endpoint.
    ///
    /// Any failure to reach or greet the server is an operation error naming the host.
    pub(crate) fn open(ctx: &SessionContext, endpoint: &Endpoint) -> Result<Self> {
        debug!(host = %endpoint.host, port = endpoint.port, "Opening connection");
        match ctx.connector.connect(endpoint) {
            Ok(connection) => Ok(Self::Connected(connection)),
            Err(err @ purgetool_imap::Error::Connect { .. }) => Err(Error::Operation(err.to_string())),
            Err(err) => Err(Error::Operation(format!(
                "Could not connect to host '{}': {err}",
                endpoint.host
            ))),
        }
    }

    pub(crate) const fn state(&self) -> AuthState {
        match self {
            Self::Authenticated(_) => AuthState::Authenticated,
            Self::Connected(_) | Self::Detached => AuthState::Unauthenticated,
        }
    }

    /// Runs an authentication step against the unauthenticated connection.
    pub(crate) fn authenticate<F>(&mut self, step: F) -> Result<()>
    where
        F: FnOnce(Box<dyn Connection>) -> std::result::Result<Box<dyn Protocol>, Rejected>,
    {
        match std::mem::replace(self, Self::Detached) {
            Self::Connected(connection) => match step(connection) {
                Ok(protocol) => {
                    info!(host = protocol.host(), "Authenticated");
                    *self = Self::Authenticated(protocol);
                    Ok(())
                }
                Err(Rejected { error, connection }) => {
                    warn!(host = connection.host(), "Authentication rejected: {error}");
                    *self = Self::Connected(connection);
                    Err(Error::Operation(format!("Authentication failed: {error}")))
                }
            },
            authenticated @ Self::Authenticated(_) => {
                *self = authenticated;
                Err(Error::State("Already authenticated!".into()))
            }
            Self::Detached => Err(Error::State(
                "Session was logged out and cannot be reused.".into(),
            )),
        }
    }

    /// Logs out and drops the connection.
    ///
    /// A connection that is already gone is not an error.
    pub(crate) fn logout(&mut self) -> Result<()> {
        if !matches!(self, Self::Authenticated(_)) {
            return Err(Error::State(NOT_AUTHENTICATED.into()));
        }
        let Self::Authenticated(mut protocol) = std::mem::replace(self, Self::Detached) else {
            return Err(Error::State(NOT_AUTHENTICATED.into()));
        };

        match protocol.logout() {
            Ok(()) => {
                info!(host = protocol.host(), "Logged out");
                Ok(())
            }
            Err(err) if err.is_connection_lost() => {
                debug!(host = protocol.host(), "Connection already closed during logout");
                Ok(())
            }
            Err(err) => Err(Error::Operation(format!("Logout failed: {err}"))),
        }
    }

    pub(crate) fn protocol(&mut self) -> Result<&mut dyn Protocol> {
        match self {
            Self::Authenticated(protocol) => Ok(protocol.as_mut()),
            Self::Connected(_) | Self::Detached => Err(Error::State(NOT_AUTHENTICATED.into())),
        }
    }
}
