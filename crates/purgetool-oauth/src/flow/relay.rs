//! Relay authorization flow.
//!
//! A relay service holds the OAuth application secret. The desktop side asks
//! it to start a flow, sends the user to the returned URL, then polls until
//! the relay has received the grant.

use crate::credentials::Credentials;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

/// Flow started by the relay.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayAuthorization {
    /// Flow identifier used for polling.
    pub flow: String,
    /// URL the user must visit to consent.
    pub url: String,
}

/// Grant returned by the relay once the user consented.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayGrant {
    /// Access token.
    pub access_token: String,
    /// Refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Expiry in milliseconds since the Unix epoch.
    pub expiry_date: i64,
}

impl RelayGrant {
    /// Converts the grant into persistable credentials.
    #[must_use]
    pub fn into_credentials(self, scopes: &[String]) -> Credentials {
        let mut credentials = Credentials::new(self.access_token).with_expiry_millis(self.expiry_date);
        credentials.refresh_token = self.refresh_token;
        credentials.scopes = scopes.to_vec();
        credentials
    }
}

#[derive(Debug, Deserialize)]
struct RelayError {
    detail: Option<String>,
}

/// Interactive authorization through a relay service.
#[derive(Debug, Clone)]
pub struct RelayFlow {
    base_url: Url,
    scopes: Vec<String>,
    timeout: Duration,
    poll_interval: Duration,
    http_client: reqwest::Client,
}

impl RelayFlow {
    /// Creates a flow against the relay at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(base_url: impl AsRef<str>, scopes: Vec<String>) -> Result<Self> {
        let mut base_url = Url::parse(base_url.as_ref())?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            scopes,
            timeout: Duration::from_secs(75),
            poll_interval: Duration::from_secs(1),
            http_client: reqwest::Client::new(),
        })
    }

    /// Sets how long to wait for the user before giving up.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the polling interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn start_url(&self) -> Result<Url> {
        Ok(self.base_url.join("flows/google")?)
    }

    fn accept_url(&self, flow: &str) -> Result<Url> {
        Ok(self.base_url.join(&format!("flows/google/accept/{flow}"))?)
    }

    /// Asks the relay to start a flow.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authorization`] with the relay's reason if it refuses.
    pub async fn start(&self) -> Result<RelayAuthorization> {
        let response = self
            .http_client
            .post(self.start_url()?)
            .json(&serde_json::json!({ "scopes": self.scopes }))
            .send()
            .await?;

        if response.status().is_client_error() || response.status().is_server_error() {
            let detail = response
                .json::<RelayError>()
                .await
                .ok()
                .and_then(|e| e.detail)
                .unwrap_or_else(|| "An unknown error occurred.".to_string());
            return Err(Error::Authorization(format!(
                "Could not fetch authorization setup data. Reason: {detail}"
            )));
        }

        let authorization: RelayAuthorization = response.json().await?;
        info!("Started relay authorization flow {}", authorization.flow);
        Ok(authorization)
    }

    /// Polls the relay until the user consents or the timeout elapses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if no grant arrives in time.
    pub async fn wait(&self, authorization: &RelayAuthorization) -> Result<Credentials> {
        let deadline = Instant::now() + self.timeout;
        let url = self.accept_url(&authorization.flow)?;

        while Instant::now() <= deadline {
            let response = self.http_client.get(url.clone()).send().await?;
            if response.status() == reqwest::StatusCode::OK {
                let grant: RelayGrant = response.json().await?;
                return Ok(grant.into_credentials(&self.scopes));
            }

            debug!("Flow {} pending ({})", authorization.flow, response.status());
            tokio::time::sleep(self.poll_interval).await;
        }

        Err(Error::Timeout(self.timeout.as_secs()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_urls() {
        let flow = RelayFlow::new("https://auth.example.com/api", Vec::new()).unwrap();
        assert_eq!(
            flow.start_url().unwrap().as_str(),
            "https://auth.example.com/api/flows/google"
        );
        assert_eq!(
            flow.accept_url("abc123").unwrap().as_str(),
            "https://auth.example.com/api/flows/google/accept/abc123"
        );
    }

    #[test]
    fn test_grant_into_credentials() {
        let json = r#"{"access_token":"ya29","refresh_token":"1//r","expiry_date":1700000000000}"#;
        let grant: RelayGrant = serde_json::from_str(json).unwrap();
        let scopes = vec!["https://mail.google.com/".to_string()];
        let creds = grant.into_credentials(&scopes);

        assert_eq!(creds.token, "ya29");
        assert_eq!(creds.refresh_token.as_deref(), Some("1//r"));
        assert_eq!(creds.expires_at.unwrap().timestamp_millis(), 1_700_000_000_000);
        assert_eq!(creds.scopes, scopes);
        assert!(creds.client_id.is_none());
    }

    #[test]
    fn test_grant_without_refresh_token() {
        let json = r#"{"access_token":"ya29","expiry_date":0}"#;
        let grant: RelayGrant = serde_json::from_str(json).unwrap();
        assert!(grant.refresh_token.is_none());
    }
}
