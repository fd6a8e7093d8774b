//! Dialing the server: TCP, optional HTTP CONNECT proxy, SRV discovery and
//! the STARTTLS upgrade.

use std::env;

use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::Error;

pub mod dns;
mod starttls;

pub use starttls::{starttls, StartTlsError};

/// Byte stream a connection can run over (plain TCP or TLS-wrapped TCP).
pub trait AsyncReadAndWrite: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncReadAndWrite for T {}

/// A boxed transport, so the codec does not care whether TLS happened.
pub type Transport = Box<dyn AsyncReadAndWrite + 'static>;

/// Append the default client port when `host` carries none.
pub(crate) fn with_default_port(host: &str) -> String {
    if host.contains(':') {
        host.to_owned()
    } else {
        format!("{}:5222", host)
    }
}

/// Open a TCP connection to `host` (a `host:port` pair), honoring the
/// `HTTP_PROXY` / `http_proxy` environment variables by tunneling through
/// HTTP CONNECT when one is set. Loopback targets are never proxied.
pub async fn dial(host: &str) -> Result<TcpStream, Error> {
    let proxy = env::var("HTTP_PROXY")
        .or_else(|_| env::var("http_proxy"))
        .ok()
        .filter(|v| !v.trim().is_empty())
        .filter(|_| !is_loopback(host));

    match proxy {
        Some(proxy) => {
            let proxy_addr = proxy_host(&proxy);
            debug!("dialing {} via HTTP proxy {}", host, proxy_addr);
            let stream = TcpStream::connect(proxy_addr.as_str())
                .await
                .map_err(|e| Error::Dial(format!("proxy {}: {}", proxy_addr, e)))?;
            http_connect(stream, host).await
        }
        None => {
            debug!("dialing {}", host);
            TcpStream::connect(host)
                .await
                .map_err(|e| Error::Dial(format!("{}: {}", host, e)))
        }
    }
}

fn is_loopback(host: &str) -> bool {
    let name = host.rsplit_once(':').map(|(h, _)| h).unwrap_or(host);
    name == "localhost"
        || name
            .parse::<std::net::IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
}

/// Extract `host:port` from a proxy URL, defaulting to port 80.
fn proxy_host(url: &str) -> String {
    let rest = match url.find("://") {
        Some(i) => &url[i + 3..],
        None => url,
    };
    let host = rest.split(['/', '?']).next().unwrap_or(rest);
    if host.contains(':') {
        host.to_owned()
    } else {
        format!("{}:80", host)
    }
}

/// RFC 7231 §4.3.6: ask the proxy for a tunnel to `host` and wait for a
/// 200. The response head is read byte-wise so no tunneled bytes are
/// consumed by accident.
async fn http_connect(mut stream: TcpStream, host: &str) -> Result<TcpStream, Error> {
    let request = format!("CONNECT {0} HTTP/1.1\r\nHost: {0}\r\n\r\n", host);
    stream.write_all(request.as_bytes()).await?;
    stream.flush().await?;

    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if stream.read(&mut byte).await? == 0 {
            return Err(Error::Dial("proxy closed the connection during CONNECT".into()));
        }
        head.push(byte[0]);
        if head.len() > 16 * 1024 {
            return Err(Error::Dial("oversized proxy CONNECT response".into()));
        }
    }

    let head = String::from_utf8_lossy(&head);
    let status = head.lines().next().unwrap_or_default().trim();
    let code = status.split(' ').nth(1).unwrap_or_default();
    if code != "200" {
        return Err(Error::Dial(format!("proxy refused CONNECT: {}", status)));
    }
    Ok(stream)
}
