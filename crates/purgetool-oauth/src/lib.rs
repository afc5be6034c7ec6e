//! # purgetool-oauth
//!
//! `OAuth2` support for purgetool's Gmail sessions.
//!
//! ## Features
//!
//! - **Credentials**: persistable authorized-user record with millisecond expiry
//! - **Token management**: refresh through the provider's token endpoint
//! - **User info**: resolve the mailbox address an access token belongs to
//! - **Relay flow**: interactive consent brokered by a relay service
//! - **SASL**: XOAUTH2 payloads for IMAP `AUTHENTICATE`
//!
//! ## Quick Start
//!
//! ```ignore
//! use purgetool_oauth::{OAuthClient, Provider, RelayFlow};
//!
//! #[tokio::main]
//! async fn main() -> purgetool_oauth::Result<()> {
//!     let provider = Provider::google()?;
//!     let flow = RelayFlow::new("https://relay.example.com", provider.default_scopes.clone())?;
//!
//!     let authorization = flow.start().await?;
//!     println!("Visit: {}", authorization.url);
//!     let mut credentials = flow.wait(&authorization).await?;
//!
//!     if credentials.is_expired() {
//!         let client = OAuthClient::for_credentials(&credentials, provider)?;
//!         client.refresh_credentials(&mut credentials).await?;
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod credentials;
mod error;
pub mod flow;
pub mod provider;
pub mod sasl;
pub mod token;

pub use credentials::Credentials;
pub use error::{Error, Result};
pub use flow::{OAuthClient, RelayAuthorization, RelayFlow, RelayGrant, user_email};
pub use provider::Provider;
pub use token::Token;
