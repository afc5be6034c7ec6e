//! Session registry: persisted kind names to session variants, and
//! version-dispatched reconstruction of the persisted session config.

use serde_json::Value;
use tracing::{error, warn};

use crate::config::{AccountEntry, ServiceConfig};
use crate::session::{Session, SessionContext};
use crate::{Error, Result};

/// Session variant named by persisted data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    /// OAuth-backed Gmail session.
    OAuth,
    /// Username/password session.
    Credential,
}

/// Kind names accepted in persisted data. The first name per kind is canonical.
const KINDS: &[(&str, SessionKind)] = &[
    ("oauth", SessionKind::OAuth),
    ("credential", SessionKind::Credential),
    ("GmailIMAP", SessionKind::OAuth),
    ("ManualIMAP", SessionKind::Credential),
];

impl SessionKind {
    /// Canonical persisted name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OAuth => "oauth",
            Self::Credential => "credential",
        }
    }

    /// Resolves a persisted kind name, including legacy names.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        KINDS
            .iter()
            .find(|(known, _)| *known == name)
            .map(|(_, kind)| *kind)
    }
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rebuilds the active session from a persisted config document.
///
/// Malformed documents, unknown kinds and unusable secrets all yield `Ok(None)`
/// with a logged diagnostic. An `active` id missing from the account list is
/// logged as an error of its own.
///
/// # Errors
///
/// Returns an operation error only when the server cannot be reached, so the
/// caller can tell "could not connect" from "not signed in".
pub fn restore(config: &Value, ctx: &SessionContext) -> Result<Option<Session>> {
    match build_versioned(config, ctx) {
        Ok(session) => Ok(session),
        Err(err @ Error::Operation(_)) => Err(err),
        Err(err @ Error::UnknownAccount(_)) => {
            error!("{err}");
            Ok(None)
        }
        Err(err) => {
            warn!("Could not restore session: {err}");
            Ok(None)
        }
    }
}

fn build_versioned(config: &Value, ctx: &SessionContext) -> Result<Option<Session>> {
    match ServiceConfig::version_of(config)?.as_str() {
        "1" => build_v1(config, ctx),
        "2" => build_v2(config, ctx),
        other => Err(Error::Config(format!("Unsupported config version '{other}'"))),
    }
}

/// `{accounts, active}`: find the active entry and build it as a version 1 payload.
fn build_v2(config: &Value, ctx: &SessionContext) -> Result<Option<Session>> {
    let config = ServiceConfig::from_value(config.clone())?;
    let Some(active) = config.active.as_deref() else {
        warn!("Service configuration has no active account");
        return Ok(None);
    };
    let entry = config
        .entry(active)
        .ok_or_else(|| Error::UnknownAccount(active.to_string()))?;

    build_entry(Some(entry.kind.as_str()), Some(&entry.data), ctx)
}

/// `{kind | class, data}`.
fn build_v1(config: &Value, ctx: &SessionContext) -> Result<Option<Session>> {
    let kind = config
        .get("kind")
        .or_else(|| config.get("class"))
        .and_then(Value::as_str);
    build_entry(kind, config.get("data"), ctx)
}

fn build_entry(kind: Option<&str>, data: Option<&Value>, ctx: &SessionContext) -> Result<Option<Session>> {
    let Some(name) = kind else {
        warn!("Service configuration does not name a session kind");
        return Ok(None);
    };
    let Some(kind) = SessionKind::parse(name) else {
        warn!("Service configuration references unknown session kind '{name}'");
        return Ok(None);
    };
    let Some(data) = data else {
        warn!("Service configuration does not contain data to build a {kind} session");
        return Ok(None);
    };

    Session::build(kind, data, ctx)
}

impl AccountEntry {
    /// Resolved kind of this entry.
    #[must_use]
    pub fn session_kind(&self) -> Option<SessionKind> {
        SessionKind::parse(&self.kind)
    }
}
