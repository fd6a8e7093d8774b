//! TLS upgrade of an already-open stream, rustls flavor.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use tokio_rustls::{
    rustls::pki_types::{InvalidDnsNameError, ServerName},
    rustls::{ClientConfig, Error as TlsError, RootCertStore},
    TlsConnector,
};

use super::Transport;
use crate::Error;

/// Wrap `transport` in TLS for `domain` and box it back up.
///
/// Callers send `<starttls/>` and read `<proceed/>` first; at that point
/// the server is waiting for our TLS hello.
pub async fn starttls(transport: Transport, domain: &str) -> Result<Transport, Error> {
    let name = ServerName::try_from(domain.to_owned()).map_err(StartTlsError::DnsName)?;

    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    let tls_stream = TlsConnector::from(Arc::new(config))
        .connect(name, transport)
        .await?;
    Ok(Box::new(tls_stream))
}

/// STARTTLS failure
#[derive(Debug)]
pub enum StartTlsError {
    /// The server answered `<failure/>` instead of `<proceed/>`
    Refused,
    /// TLS error
    Tls(TlsError),
    /// DNS name parsing error
    DnsName(InvalidDnsNameError),
}

impl fmt::Display for StartTlsError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Refused => write!(fmt, "server refused STARTTLS"),
            Self::Tls(e) => write!(fmt, "TLS error: {}", e),
            Self::DnsName(e) => write!(fmt, "DNS name error: {}", e),
        }
    }
}

impl StdError for StartTlsError {}

impl From<TlsError> for StartTlsError {
    fn from(e: TlsError) -> Self {
        Self::Tls(e)
    }
}

impl From<InvalidDnsNameError> for StartTlsError {
    fn from(e: InvalidDnsNameError) -> Self {
        Self::DnsName(e)
    }
}
