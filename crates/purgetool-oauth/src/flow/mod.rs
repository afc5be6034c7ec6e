//! `OAuth2` client operations and authorization flows.

mod relay;

pub use relay::{RelayAuthorization, RelayFlow, RelayGrant};

use std::collections::HashMap;

use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::token::{EndpointError, Token, TokenResponse};

/// Talks to a provider's token and user-info endpoints on behalf of one OAuth application.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    /// Application id.
    pub client_id: String,
    /// Application secret; public clients have none.
    pub client_secret: Option<String>,
    /// Endpoints.
    pub provider: Provider,
    http_client: Client,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
}

/// Decodes a success body, or turns an error body into [`Error::OAuth`].
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    if response.status().is_success() {
        return Ok(response.json().await?);
    }
    let status = response.status();
    match response.json::<EndpointError>().await {
        Ok(body) => Err(body.into_error()),
        Err(_) => Err(Error::oauth_error(status.as_str(), "no error body")),
    }
}

impl OAuthClient {
    /// Creates a client for a public application.
    #[must_use]
    pub fn new(client_id: impl Into<String>, provider: Provider) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            provider,
            http_client: Client::new(),
        }
    }

    /// Sets the application secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Creates a client for the application the credentials were issued to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoClientId`] if the credentials do not name one.
    pub fn for_credentials(credentials: &Credentials, provider: Provider) -> Result<Self> {
        let client_id = credentials.client_id.as_deref().ok_or(Error::NoClientId)?;
        let client = Self::new(client_id, provider);
        Ok(match &credentials.client_secret {
            Some(secret) => client.with_client_secret(secret),
            None => client,
        })
    }

    /// Exchanges the token's refresh token for a new access token.
    ///
    /// A reply without a refresh token keeps the old one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRefreshToken`] before any request if there is nothing
    /// to refresh with, or the endpoint's error otherwise.
    pub async fn refresh_token(&self, token: &Token) -> Result<Token> {
        let mut form = HashMap::from([
            ("grant_type", "refresh_token"),
            ("refresh_token", token.refresh_token()?),
            ("client_id", self.client_id.as_str()),
        ]);
        if let Some(secret) = &self.client_secret {
            form.insert("client_secret", secret.as_str());
        }

        let response = self
            .http_client
            .post(self.provider.token_url.clone())
            .form(&form)
            .send()
            .await?;
        let mut refreshed = Token::try_from(decode::<TokenResponse>(response).await?)?;
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token.clone_from(&token.refresh_token);
        }

        debug!(provider = %self.provider.name, "Access token refreshed");
        Ok(refreshed)
    }

    /// Refreshes credentials in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh fails; the credentials are then untouched.
    pub async fn refresh_credentials(&self, credentials: &mut Credentials) -> Result<()> {
        let token = self.refresh_token(&credentials.to_token()).await?;
        credentials.apply(token);
        Ok(())
    }

    /// Looks up the address of the account an access token belongs to.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the reply names no address.
    pub async fn user_email(&self, access_token: &str) -> Result<String> {
        user_email(&self.http_client, &self.provider, access_token).await
    }
}

/// Looks up the account address through the provider's user-info endpoint.
///
/// # Errors
///
/// Returns an error if the request fails or the reply names no address.
pub async fn user_email(http: &Client, provider: &Provider, access_token: &str) -> Result<String> {
    let response = http
        .get(provider.userinfo_url.clone())
        .bearer_auth(access_token)
        .send()
        .await?;
    let info: UserInfo = decode(response).await?;
    info.email
        .filter(|email| !email.is_empty())
        .ok_or_else(|| Error::InvalidResponse("user-info reply has no email".into()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth_client_creation() {
        let provider = Provider::google().unwrap();
        let client = OAuthClient::new("test_client_id", provider);
        assert_eq!(client.client_id, "test_client_id");
        assert!(client.client_secret.is_none());
    }

    #[test]
    fn test_client_for_credentials() {
        let creds = Credentials::new("t").with_client("id-1", Some("s3cret".to_string()));
        let client = OAuthClient::for_credentials(&creds, Provider::google().unwrap()).unwrap();
        assert_eq!(client.client_id, "id-1");
        assert_eq!(client.client_secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_client_for_credentials_without_client() {
        let creds = Credentials::new("t");
        assert!(matches!(
            OAuthClient::for_credentials(&creds, Provider::google().unwrap()),
            Err(Error::NoClientId)
        ));
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token() {
        let client = OAuthClient::new("id", Provider::google().unwrap());
        let mut creds = Credentials::new("t");
        let err = client.refresh_credentials(&mut creds).await.unwrap_err();
        assert!(matches!(err, Error::NoRefreshToken));
        assert_eq!(creds.token, "t");
    }
}
