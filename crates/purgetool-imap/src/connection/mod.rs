//! IMAP connection management.
//!
//! The session layer talks to the server through two object-safe traits:
//! - [`Connection`]: a greeted but unauthenticated connection
//! - [`Protocol`]: an authenticated connection exposing the mailbox primitives
//!
//! [`Connector`] produces connections; [`TlsConnector`] is the real one.

mod client;
mod config;
mod stream;

use std::collections::HashSet;
use std::fmt;

pub use client::{ImapConnection, ImapProtocol, TlsConnector};
pub use config::{Endpoint, IMAPS_PORT};
pub use stream::{TlsStream, connect_tcp, connect_tls, tls_config};

use crate::{Error, Result};

/// Produces one side of a SASL exchange from server challenges.
pub trait SaslExchange {
    /// Builds the response to a (base64-decoded) server challenge.
    fn respond(&self, challenge: &[u8]) -> Vec<u8>;
}

/// Authentication was refused; the connection is handed back unauthenticated.
pub struct Rejected {
    /// Why the server refused.
    pub error: Error,
    /// The still-open connection.
    pub connection: Box<dyn Connection>,
}

impl fmt::Debug for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("error", &self.error)
            .field("host", &self.connection.host())
            .finish()
    }
}

/// A connection that has been greeted but not yet authenticated.
pub trait Connection: Send {
    /// Host this connection talks to.
    fn host(&self) -> &str;

    /// Authenticates with LOGIN.
    ///
    /// # Errors
    ///
    /// Returns the connection alongside the failure if the server refuses.
    fn login(
        self: Box<Self>,
        username: &str,
        password: &str,
    ) -> std::result::Result<Box<dyn Protocol>, Rejected>;

    /// Authenticates with AUTHENTICATE using the given SASL mechanism.
    ///
    /// # Errors
    ///
    /// Returns the connection alongside the failure if the exchange fails.
    fn authenticate(
        self: Box<Self>,
        mechanism: &str,
        exchange: &dyn SaslExchange,
    ) -> std::result::Result<Box<dyn Protocol>, Rejected>;
}

/// An authenticated connection.
///
/// Every call is blocking. A NO/BAD completion surfaces as [`Error::No`] or [`Error::Bad`].
#[allow(clippy::missing_errors_doc)]
pub trait Protocol: Send {
    /// Host this connection talks to.
    fn host(&self) -> &str;

    /// Selects a mailbox.
    fn select(&mut self, mailbox: &str) -> Result<()>;

    /// Runs SEARCH and returns the matching sequence numbers.
    fn search(&mut self, query: &str) -> Result<HashSet<u32>>;

    /// Runs FETCH and returns the header section of every returned message.
    fn fetch_headers(&mut self, sequence_set: &str, query: &str) -> Result<Vec<Vec<u8>>>;

    /// Runs STORE.
    fn store(&mut self, sequence_set: &str, query: &str) -> Result<()>;

    /// Runs COPY.
    fn copy(&mut self, sequence_set: &str, mailbox: &str) -> Result<()>;

    /// Runs EXPUNGE.
    fn expunge(&mut self) -> Result<()>;

    /// Runs `LIST "" "*"` and returns each listing line without the `* LIST ` prefix,
    /// e.g. `(\HasNoChildren) "/" "INBOX"`.
    fn list(&mut self) -> Result<Vec<String>>;

    /// Runs LOGOUT.
    fn logout(&mut self) -> Result<()>;
}

/// Opens connections to IMAP servers.
pub trait Connector: Send + Sync {
    /// Connects to the endpoint and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] if the host cannot be reached.
    fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Connection>>;
}
