//! [`Connection`] and [`Protocol`] backed by the `imap` client library.

use std::collections::HashSet;

use tracing::{debug, info};

use super::{Connection, Connector, Endpoint, Protocol, Rejected, SaslExchange, TlsStream};
use crate::Result;

/// Untagged prefix of a LIST response line.
const LIST_PREFIX: &str = "* LIST ";

/// Opens TLS connections with [`connect_tls`](super::connect_tls).
#[derive(Debug, Clone, Copy, Default)]
pub struct TlsConnector {
    debug: bool,
}

impl TlsConnector {
    /// Creates a connector.
    #[must_use]
    pub const fn new() -> Self {
        Self { debug: false }
    }

    /// Enables the client library's protocol trace on every connection.
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

impl Connector for TlsConnector {
    fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Connection>> {
        let stream = super::connect_tls(endpoint)?;
        let mut client = imap::Client::new(stream);
        client.debug = self.debug;
        client.read_greeting()?;
        info!("Connected to {}:{}", endpoint.host, endpoint.port);

        Ok(Box::new(ImapConnection {
            host: endpoint.host.clone(),
            client,
        }))
    }
}

/// Adapts a [`SaslExchange`] to the client library's authenticator.
struct Exchange<'a>(&'a dyn SaslExchange);

impl imap::Authenticator for Exchange<'_> {
    type Response = Vec<u8>;

    fn process(&self, challenge: &[u8]) -> Self::Response {
        self.0.respond(challenge)
    }
}

/// Unauthenticated connection over TLS.
pub struct ImapConnection {
    host: String,
    client: imap::Client<TlsStream>,
}

impl ImapConnection {
    fn authenticated(host: String, session: imap::Session<TlsStream>) -> Box<dyn Protocol> {
        Box::new(ImapProtocol { host, session })
    }

    fn rejected(host: String, error: imap::error::Error, client: imap::Client<TlsStream>) -> Rejected {
        Rejected {
            error: error.into(),
            connection: Box::new(Self { host, client }),
        }
    }
}

impl Connection for ImapConnection {
    fn host(&self) -> &str {
        &self.host
    }

    fn login(
        self: Box<Self>,
        username: &str,
        password: &str,
    ) -> std::result::Result<Box<dyn Protocol>, Rejected> {
        let Self { host, client } = *self;
        match client.login(username, password) {
            Ok(session) => Ok(Self::authenticated(host, session)),
            Err((error, client)) => Err(Self::rejected(host, error, client)),
        }
    }

    fn authenticate(
        self: Box<Self>,
        mechanism: &str,
        exchange: &dyn SaslExchange,
    ) -> std::result::Result<Box<dyn Protocol>, Rejected> {
        let Self { host, client } = *self;
        match client.authenticate(mechanism, &Exchange(exchange)) {
            Ok(session) => Ok(Self::authenticated(host, session)),
            Err((error, client)) => Err(Self::rejected(host, error, client)),
        }
    }
}

/// Authenticated connection over TLS.
pub struct ImapProtocol {
    host: String,
    session: imap::Session<TlsStream>,
}

impl Protocol for ImapProtocol {
    fn host(&self) -> &str {
        &self.host
    }

    fn select(&mut self, mailbox: &str) -> Result<()> {
        let status = self.session.select(mailbox)?;
        debug!("Selected {mailbox}: {} messages", status.exists);
        Ok(())
    }

    fn search(&mut self, query: &str) -> Result<HashSet<u32>> {
        Ok(self.session.search(query)?)
    }

    fn fetch_headers(&mut self, sequence_set: &str, query: &str) -> Result<Vec<Vec<u8>>> {
        let fetches = self.session.fetch(sequence_set, query)?;
        Ok(fetches
            .iter()
            .filter_map(|fetch| fetch.header().or_else(|| fetch.body()))
            .map(<[u8]>::to_vec)
            .collect())
    }

    fn store(&mut self, sequence_set: &str, query: &str) -> Result<()> {
        self.session.store(sequence_set, query)?;
        Ok(())
    }

    fn copy(&mut self, sequence_set: &str, mailbox: &str) -> Result<()> {
        // The client library sends the destination verbatim.
        self.session.copy(sequence_set, &quote_mailbox(mailbox))?;
        Ok(())
    }

    fn expunge(&mut self) -> Result<()> {
        let expunged = self.session.expunge()?;
        debug!("Expunged {} messages", expunged.len());
        Ok(())
    }

    fn list(&mut self) -> Result<Vec<String>> {
        let raw = self
            .session
            .run_command_and_read_response("LIST \"\" \"*\"")?;
        Ok(listing_lines(&String::from_utf8_lossy(&raw)))
    }

    fn logout(&mut self) -> Result<()> {
        self.session.logout()?;
        Ok(())
    }
}

/// Renders a mailbox name as an IMAP quoted string.
fn quote_mailbox(mailbox: &str) -> String {
    let mut quoted = String::with_capacity(mailbox.len() + 2);
    quoted.push('"');
    for c in mailbox.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Extracts the LIST payloads from a raw untagged response block.
fn listing_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .filter_map(|line| line.strip_prefix(LIST_PREFIX))
        .map(|line| line.trim_end().to_string())
        .collect()
}
