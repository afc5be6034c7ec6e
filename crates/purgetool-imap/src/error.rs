//! Error types for the IMAP layer.

use thiserror::Error;

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The server could not be resolved or reached.
    #[error("Could not connect to host '{host}': {source}")]
    Connect {
        /// Host that was being contacted.
        host: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Server returned NO response.
    #[error("Server returned NO: {0}")]
    No(String),

    /// Server returned BAD response.
    #[error("Server returned BAD: {0}")]
    Bad(String),

    /// The connection went away underneath us (socket EOF, reset, BYE).
    #[error("Connection lost")]
    ConnectionLost,

    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol violation, parse failure or anything else the client library reports.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Returns true if the server answered with a non-OK status (NO or BAD).
    #[must_use]
    pub const fn is_status(&self) -> bool {
        matches!(self, Self::No(_) | Self::Bad(_))
    }

    /// Returns true if the failure means the connection is gone.
    #[must_use]
    pub const fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost)
    }
}

impl From<imap::error::Error> for Error {
    fn from(err: imap::error::Error) -> Self {
        use std::io::ErrorKind;

        match err {
            imap::error::Error::No(msg) => Self::No(msg),
            imap::error::Error::Bad(msg) => Self::Bad(msg),
            imap::error::Error::ConnectionLost => Self::ConnectionLost,
            imap::error::Error::Io(io) => match io.kind() {
                ErrorKind::UnexpectedEof
                | ErrorKind::ConnectionAborted
                | ErrorKind::ConnectionReset
                | ErrorKind::BrokenPipe => Self::ConnectionLost,
                _ => Self::Io(io),
            },
            other => Self::Protocol(other.to_string()),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_errors() {
        let no: Error = imap::error::Error::No("[TRYCREATE] no such mailbox".to_string()).into();
        assert!(no.is_status());
        assert!(matches!(no, Error::No(_)));

        let bad: Error = imap::error::Error::Bad("parse error".to_string()).into();
        assert!(bad.is_status());
    }

    #[test]
    fn test_socket_eof_is_connection_lost() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: Error = imap::error::Error::Io(io).into();
        assert!(err.is_connection_lost());
        assert!(!err.is_status());
    }

    #[test]
    fn test_connect_error_names_host() {
        let err = Error::Connect {
            host: "imap.invalid".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no address"),
        };
        assert!(err.to_string().contains("imap.invalid"));
    }
}
