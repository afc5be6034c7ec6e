//! Token refresh and user-info lookup used while rebuilding OAuth sessions.

use std::future::Future;

use purgetool_oauth::{Credentials, OAuthClient, Provider};
use tracing::debug;

use crate::Result;

/// Network side of OAuth session construction.
///
/// Implementations block; they are only called from worker threads.
pub trait TokenAuthority: Send + Sync {
    /// Replaces the access token and recomputes the expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials cannot be refreshed.
    fn refresh(&self, credentials: &mut Credentials) -> Result<()>;

    /// Resolves the address of the account the credentials belong to.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn user_email(&self, credentials: &Credentials) -> Result<String>;
}

/// [`TokenAuthority`] backed by Google's token and user-info endpoints.
#[derive(Debug, Clone)]
pub struct GoogleAuthority {
    provider: Provider,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl GoogleAuthority {
    /// Creates an authority for the given provider.
    #[must_use]
    pub const fn new(provider: Provider) -> Self {
        Self {
            provider,
            client_id: None,
            client_secret: None,
        }
    }

    /// OAuth application used when stored credentials do not name one.
    #[must_use]
    pub fn with_client(mut self, client_id: impl Into<String>, client_secret: Option<String>) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = client_secret;
        self
    }

    /// Returns the provider.
    #[must_use]
    pub const fn provider(&self) -> &Provider {
        &self.provider
    }

    fn block_on<F: Future>(future: F) -> Result<F::Output> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(runtime.block_on(future))
    }
}

impl TokenAuthority for GoogleAuthority {
    fn refresh(&self, credentials: &mut Credentials) -> Result<()> {
        if credentials.client_id.is_none()
            && let Some(client_id) = &self.client_id
        {
            credentials.client_id = Some(client_id.clone());
            credentials.client_secret.clone_from(&self.client_secret);
        }

        let client = OAuthClient::for_credentials(credentials, self.provider.clone())?;
        Self::block_on(client.refresh_credentials(credentials))??;
        debug!("Refreshed access token");
        Ok(())
    }

    fn user_email(&self, credentials: &Credentials) -> Result<String> {
        let client_id = credentials
            .client_id
            .clone()
            .or_else(|| self.client_id.clone())
            .unwrap_or_default();
        let client = OAuthClient::new(client_id, self.provider.clone());
        Ok(Self::block_on(client.user_email(&credentials.token))??)
    }
}
