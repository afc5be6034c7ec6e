//! Blocking TLS streams for IMAP connections.

use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, StreamOwned};
use tracing::debug;

use super::Endpoint;
use crate::{Error, Result};

/// A TLS-encrypted TCP stream.
pub type TlsStream = StreamOwned<ClientConnection, TcpStream>;

/// Creates a TLS client configuration with the webpki root certificates.
///
/// The aws-lc-rs provider is named explicitly. Other crates in the process may
/// enable a second rustls provider, and then no process default can be picked.
///
/// # Errors
///
/// Returns [`Error::Tls`] if the provider supports none of the default protocol versions.
pub fn tls_config() -> Result<Arc<ClientConfig>> {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());

    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(Arc::new(config))
}

/// Resolves the endpoint and opens a TCP connection to the first reachable address.
///
/// # Errors
///
/// Returns [`Error::Connect`] naming the host if resolution or every connection attempt fails.
pub fn connect_tcp(endpoint: &Endpoint) -> Result<TcpStream> {
    let connect_error = |source| Error::Connect {
        host: endpoint.host.clone(),
        source,
    };

    let addrs = (endpoint.host.as_str(), endpoint.port)
        .to_socket_addrs()
        .map_err(connect_error)?;

    let mut last_error = None;
    for addr in addrs {
        debug!("Connecting to {} ({addr})", endpoint.host);
        match TcpStream::connect_timeout(&addr, endpoint.connect_timeout) {
            Ok(tcp) => {
                tcp.set_read_timeout(Some(endpoint.io_timeout))?;
                tcp.set_write_timeout(Some(endpoint.io_timeout))?;
                return Ok(tcp);
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(connect_error(last_error.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved")
    })))
}

/// Connects to a server with TLS from the start.
///
/// # Errors
///
/// Returns an error if the host cannot be reached or the TLS session cannot be set up.
pub fn connect_tls(endpoint: &Endpoint) -> Result<TlsStream> {
    let tcp = connect_tcp(endpoint)?;
    let server_name = ServerName::try_from(endpoint.host.clone())?;
    let connection = ClientConnection::new(tls_config()?, server_name)?;
    Ok(StreamOwned::new(connection, tcp))
}
