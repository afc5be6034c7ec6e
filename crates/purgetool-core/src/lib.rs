//! # purgetool-core
//!
//! Session, mailbox cleanup and background dispatch for purgetool.
//!
//! This crate provides:
//! - **Sessions** - OAuth and credential IMAP sessions with an explicit
//!   authentication state machine
//! - **Session registry** - rebuilds the active session from versioned,
//!   persisted configuration
//! - **Mailbox operations** - sender discovery, batched sender search,
//!   move-to-junk and permanent delete
//! - **Task dispatcher** - runs blocking work off the presentation thread and
//!   marshals results back onto it
//! - **Cache** - timestamped JSON cache of discovered senders
//! - **Settings** - user preferences

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod dispatch;
mod error;
pub mod registry;
pub mod service;
pub mod session;
pub mod settings;

#[cfg(test)]
mod testing;

pub use cache::{CacheStore, SenderCache};
pub use config::{AccountEntry, ServiceConfig, ServiceConfigStore};
pub use dispatch::{DeferredTask, Dispatcher};
pub use error::{Error, Result};
pub use registry::{SessionKind, restore};
pub use service::{CleanserService, DEFAULT_MAILBOX, sorted_for_display};
pub use session::{
    AuthState, CredentialSession, GoogleAuthority, OAuthSession, Session, SessionContext,
    TokenAuthority,
};
pub use settings::{Settings, SettingsError};
