//! XOAUTH2 payloads for IMAP `AUTHENTICATE`.
//!
//! Payloads are returned raw; the IMAP client library does the base64 encoding.

use serde::Deserialize;

/// Builds the XOAUTH2 initial client response.
///
/// ```
/// use purgetool_oauth::sasl::xoauth2_payload;
///
/// let payload = xoauth2_payload("user@example.com", "ya29.a0");
/// assert_eq!(payload, "user=user@example.com\x01auth=Bearer ya29.a0\x01\x01");
/// ```
#[must_use]
pub fn xoauth2_payload(user: &str, token: &str) -> String {
    format!("user={user}\x01auth=Bearer {token}\x01\x01")
}

/// Error document a server sends as the challenge after a rejected XOAUTH2 response.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthError {
    /// HTTP-style status, e.g. `"401"`.
    pub status: String,
    /// Accepted schemes.
    #[serde(default)]
    pub schemes: String,
    /// Scope the server wanted.
    #[serde(default)]
    pub scope: Option<String>,
}

/// Reads a rejection challenge.
///
/// # Errors
///
/// Returns an error if the challenge is not a JSON error document.
pub fn parse_oauth_error(challenge: &[u8]) -> Result<OAuthError, serde_json::Error> {
    serde_json::from_slice(challenge)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_gmail_rejection() {
        let challenge = br#"{"status":"400","schemes":"Bearer","scope":"https://mail.google.com/"}"#;
        let error = parse_oauth_error(challenge).unwrap();
        assert_eq!(error.status, "400");
        assert_eq!(error.scope.as_deref(), Some("https://mail.google.com/"));
    }

    #[test]
    fn test_unreadable_challenge() {
        assert!(parse_oauth_error(b"+ go ahead").is_err());
    }
}
