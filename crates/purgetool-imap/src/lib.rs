//! # purgetool-imap
//!
//! Blocking IMAP plumbing for purgetool, built on the `imap` client library.
//!
//! The crate does not speak the wire protocol itself. It provides:
//!
//! - **TLS via rustls**: implicit-TLS connections with webpki roots
//! - **Object-safe seams**: [`Connection`] (unauthenticated) and [`Protocol`]
//!   (authenticated) so the session layer can be driven by a fake server in tests
//! - **Typed failures**: NO/BAD completions, lost connections and unreachable
//!   hosts are distinct [`Error`] variants
//!
//! ## Connection States
//!
//! ```text
//! Connector::connect ──→ Connection ── login()/authenticate() ──→ Protocol
//!                            ▲                  │
//!                            └──── Rejected ────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod connection;
mod error;

pub use connection::{
    Connection, Connector, Endpoint, IMAPS_PORT, Protocol, Rejected, SaslExchange, TlsConnector,
};
pub use error::{Error, Result};
