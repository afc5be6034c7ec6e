//! In-memory IMAP server and token authority for unit tests.

#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::cast_possible_truncation
)]

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Duration, Utc};
use purgetool_imap::{Connection, Connector, Endpoint, Protocol, Rejected, SaslExchange};
use purgetool_oauth::Credentials;

use crate::service::address_from_header;
use crate::session::{SessionContext, TokenAuthority};
use crate::{Error, Result};

/// How an injected failure surfaces.
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    No,
    Lost,
}

impl Failure {
    fn error(self, op: &str) -> purgetool_imap::Error {
        match self {
            Self::No => purgetool_imap::Error::No(format!("{op} refused")),
            Self::Lost => purgetool_imap::Error::ConnectionLost,
        }
    }
}

#[derive(Debug, Default)]
pub struct ServerState {
    /// `From` header value per message; sequence number is index + 1.
    pub messages: Vec<String>,
    pub folders: Vec<String>,
    pub unreachable: HashSet<String>,
    pub refuse_auth: bool,
    /// Second SASL challenge sent after the initial response.
    pub sasl_challenge: Option<Vec<u8>>,
    pub failures: HashMap<&'static str, Failure>,
    /// Every command received, in order.
    pub calls: Vec<String>,
    pub sasl_responses: Vec<Vec<u8>>,
    pub connects: Vec<(String, u16)>,
}

/// Scripted server shared by every connection it hands out.
#[derive(Clone, Default)]
pub struct FakeServer {
    state: Arc<Mutex<ServerState>>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages<I, S>(self, from_headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state().messages = from_headers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_folders(self, folders: &[&str]) -> Self {
        self.state().folders = folders.iter().map(|f| (*f).to_string()).collect();
        self
    }

    pub fn fail(&self, op: &'static str, failure: Failure) {
        self.state().failures.insert(op, failure);
    }

    pub fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn ops(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|call| call.split(' ').next().unwrap_or_default().to_string())
            .collect()
    }

    pub fn context(&self, authority: FakeAuthority) -> SessionContext {
        SessionContext::new(Arc::new(self.clone()), Arc::new(authority))
    }

    fn record(&self, call: String) {
        self.state().calls.push(call);
    }

    fn check(&self, op: &'static str) -> purgetool_imap::Result<()> {
        match self.state().failures.get(op) {
            Some(failure) => Err(failure.error(op)),
            None => Ok(()),
        }
    }
}

impl Connector for FakeServer {
    fn connect(&self, endpoint: &Endpoint) -> purgetool_imap::Result<Box<dyn Connection>> {
        if self.state().unreachable.contains(&endpoint.host) {
            return Err(purgetool_imap::Error::Connect {
                host: endpoint.host.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "name does not resolve"),
            });
        }
        self.state()
            .connects
            .push((endpoint.host.clone(), endpoint.port));
        Ok(Box::new(FakeConnection {
            host: endpoint.host.clone(),
            server: self.clone(),
        }))
    }
}

struct FakeConnection {
    host: String,
    server: FakeServer,
}

impl FakeConnection {
    fn accept(self: Box<Self>) -> std::result::Result<Box<dyn Protocol>, Rejected> {
        if self.server.state().refuse_auth {
            return Err(Rejected {
                error: purgetool_imap::Error::No("authentication failed".into()),
                connection: self,
            });
        }
        Ok(Box::new(FakeProtocol {
            host: self.host,
            server: self.server,
            selected: None,
        }))
    }
}

impl Connection for FakeConnection {
    fn host(&self) -> &str {
        &self.host
    }

    fn login(
        self: Box<Self>,
        username: &str,
        password: &str,
    ) -> std::result::Result<Box<dyn Protocol>, Rejected> {
        self.server.record(format!("LOGIN {username} {password}"));
        self.accept()
    }

    fn authenticate(
        self: Box<Self>,
        mechanism: &str,
        exchange: &dyn SaslExchange,
    ) -> std::result::Result<Box<dyn Protocol>, Rejected> {
        self.server.record(format!("AUTHENTICATE {mechanism}"));
        let initial = exchange.respond(b"");
        let challenge = self.server.state().sasl_challenge.clone();
        let mut state = self.server.state();
        state.sasl_responses.push(initial);
        if let Some(challenge) = challenge {
            state.sasl_responses.push(exchange.respond(&challenge));
        }
        drop(state);
        self.accept()
    }
}

struct FakeProtocol {
    host: String,
    server: FakeServer,
    selected: Option<String>,
}

fn parse_set(sequence_set: &str) -> Vec<u32> {
    sequence_set
        .split(',')
        .map(|id| id.parse().unwrap())
        .collect()
}

impl Protocol for FakeProtocol {
    fn host(&self) -> &str {
        &self.host
    }

    fn select(&mut self, mailbox: &str) -> purgetool_imap::Result<()> {
        self.server.record(format!("SELECT {mailbox}"));
        self.server.check("select")?;
        self.selected = Some(mailbox.to_string());
        Ok(())
    }

    fn search(&mut self, query: &str) -> purgetool_imap::Result<HashSet<u32>> {
        assert!(self.selected.is_some(), "SEARCH without SELECT");
        self.server.record(format!("SEARCH {query}"));
        self.server.check("search")?;
        let senders: Vec<String> = self
            .server
            .state()
            .messages
            .iter()
            .map(|header| address_from_header(header))
            .collect();
        Ok(evaluate(query, &senders))
    }

    fn fetch_headers(&mut self, sequence_set: &str, query: &str) -> purgetool_imap::Result<Vec<Vec<u8>>> {
        self.server.record(format!("FETCH {sequence_set} {query}"));
        self.server.check("fetch")?;
        let state = self.server.state();
        Ok(parse_set(sequence_set)
            .into_iter()
            .map(|seq| format!("From: {}\r\n\r\n", state.messages[seq as usize - 1]).into_bytes())
            .collect())
    }

    fn store(&mut self, sequence_set: &str, query: &str) -> purgetool_imap::Result<()> {
        self.server.record(format!("STORE {sequence_set} {query}"));
        self.server.check("store")
    }

    fn copy(&mut self, sequence_set: &str, mailbox: &str) -> purgetool_imap::Result<()> {
        self.server.record(format!("COPY {sequence_set} {mailbox}"));
        self.server.check("copy")
    }

    fn expunge(&mut self) -> purgetool_imap::Result<()> {
        self.server.record("EXPUNGE".to_string());
        self.server.check("expunge")
    }

    fn list(&mut self) -> purgetool_imap::Result<Vec<String>> {
        self.server.record("LIST".to_string());
        self.server.check("list")?;
        Ok(self
            .server
            .state()
            .folders
            .iter()
            .map(|name| format!(r#"(\HasNoChildren) "/" "{name}""#))
            .collect())
    }

    fn logout(&mut self) -> purgetool_imap::Result<()> {
        self.server.record("LOGOUT".to_string());
        self.server.check("logout")
    }
}

/// Evaluates a SEARCH query built from `ALL`, `OR` and `FROM "<address>"`.
///
/// `senders[i]` is the sender of sequence number `i + 1`. FROM matches exactly.
pub fn evaluate(query: &str, senders: &[String]) -> HashSet<u32> {
    let tokens = tokenize(query);
    let mut pos = 0;
    let mut result = HashSet::new();
    while pos < tokens.len() {
        result.extend(eval_key(&tokens, &mut pos, senders));
    }
    result
}

fn eval_key(tokens: &[String], pos: &mut usize, senders: &[String]) -> HashSet<u32> {
    let token = tokens[*pos].clone();
    *pos += 1;
    match token.as_str() {
        "ALL" => (1..=senders.len() as u32).collect(),
        "OR" => {
            let left = eval_key(tokens, pos, senders);
            let right = eval_key(tokens, pos, senders);
            left.union(&right).copied().collect()
        }
        "FROM" => {
            let address = &tokens[*pos];
            *pos += 1;
            senders
                .iter()
                .enumerate()
                .filter(|(_, sender)| *sender == address)
                .map(|(i, _)| i as u32 + 1)
                .collect()
        }
        other => panic!("unsupported search key {other}"),
    }
}

fn tokenize(query: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = query.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c == ' ' {
            chars.next();
        } else if c == '"' {
            chars.next();
            let mut value = String::new();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => value.extend(chars.next()),
                    '"' => break,
                    _ => value.push(c),
                }
            }
            tokens.push(value);
        } else {
            let mut atom = String::new();
            while let Some(&c) = chars.peek() {
                if c == ' ' {
                    break;
                }
                atom.push(c);
                chars.next();
            }
            tokens.push(atom);
        }
    }
    tokens
}

/// Token authority with canned answers.
#[derive(Clone)]
pub struct FakeAuthority {
    pub email: Option<String>,
    pub refreshed_token: Option<String>,
    pub refreshes: Arc<Mutex<usize>>,
}

impl FakeAuthority {
    pub fn new(email: &str) -> Self {
        Self {
            email: Some(email.to_string()),
            refreshed_token: Some("refreshed-token".to_string()),
            refreshes: Arc::default(),
        }
    }

    pub fn refreshes(&self) -> usize {
        *self.refreshes.lock().unwrap()
    }
}

impl TokenAuthority for FakeAuthority {
    fn refresh(&self, credentials: &mut Credentials) -> Result<()> {
        *self.refreshes.lock().unwrap() += 1;
        let token = self
            .refreshed_token
            .clone()
            .ok_or_else(|| Error::OAuth(purgetool_oauth::Error::NoRefreshToken))?;
        credentials.token = token;
        credentials.expires_at = Some(Utc::now() + Duration::hours(1));
        Ok(())
    }

    fn user_email(&self, _credentials: &Credentials) -> Result<String> {
        self.email
            .clone()
            .ok_or_else(|| Error::OAuth(purgetool_oauth::Error::InvalidResponse("no email".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_prefix_or() {
        let senders: Vec<String> = ["a@x", "b@x", "c@x", "a@x"].iter().map(|s| (*s).to_string()).collect();
        let ids = evaluate(r#"OR FROM "a@x" FROM "c@x""#, &senders);
        assert_eq!(ids, HashSet::from([1, 3, 4]));

        let ids = evaluate(r#"OR OR FROM "a@x" FROM "b@x" FROM "c@x""#, &senders);
        assert_eq!(ids, HashSet::from([1, 2, 3, 4]));
        assert_eq!(evaluate("ALL", &senders).len(), 4);
    }
}
