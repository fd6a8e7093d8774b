//! Detailed error types

use hickory_resolver::{
    error::ResolveError as DnsResolveError, proto::error::ProtoError as DnsProtoError,
};
use std::error::Error as StdError;
use std::fmt;
use std::io::Error as IoError;
use std::str::Utf8Error;

use crate::connect::StartTlsError;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(IoError),
    /// TCP dial or HTTP CONNECT failure
    Dial(String),
    /// Protocol-level error
    Protocol(ProtocolError),
    /// Authentication error
    Auth(AuthError),
    /// STARTTLS refused or TLS handshake failed
    Tls(StartTlsError),
    /// JID without an `@`, or with an empty domainpart
    InvalidJid(String),
    /// Connection closed
    Disconnected,
    /// Operation attempted while not connected
    NotConnected,
    /// `connect` called on an already connected client
    AlreadyConnected,
    /// No answer to a ping IQ within the ping deadline
    PingTimeout,
    /// No `result` IQ for a roster request within the roster deadline
    NoRosterResponse,
    /// Utf8 error
    Utf8(Utf8Error),
    /// DNS protocol error
    Dns(DnsProtoError),
    /// DNS resolution error
    Resolve(DnsResolveError),
    /// DNS label conversion error, no details available from module `idna`
    Idna,
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(fmt, "IO error: {}", e),
            Error::Dial(e) => write!(fmt, "dial error: {}", e),
            Error::Protocol(e) => write!(fmt, "protocol error: {}", e),
            Error::Auth(e) => write!(fmt, "authentication error: {}", e),
            Error::Tls(e) => write!(fmt, "TLS error: {}", e),
            Error::InvalidJid(jid) => write!(fmt, "invalid JID (want user@domain): {}", jid),
            Error::Disconnected => write!(fmt, "disconnected"),
            Error::NotConnected => write!(fmt, "not connected"),
            Error::AlreadyConnected => write!(fmt, "already connected"),
            Error::PingTimeout => write!(fmt, "ping timeout"),
            Error::NoRosterResponse => write!(fmt, "no roster response from server"),
            Error::Utf8(e) => write!(fmt, "Utf8 error: {}", e),
            Error::Dns(e) => write!(fmt, "{:?}", e),
            Error::Resolve(e) => write!(fmt, "{:?}", e),
            Error::Idna => write!(fmt, "IDNA error"),
        }
    }
}

impl StdError for Error {}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::Io(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<AuthError> for Error {
    fn from(e: AuthError) -> Self {
        Error::Auth(e)
    }
}

impl From<StartTlsError> for Error {
    fn from(e: StartTlsError) -> Self {
        Error::Tls(e)
    }
}

impl From<Utf8Error> for Error {
    fn from(e: Utf8Error) -> Self {
        Error::Utf8(e)
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::Protocol(ProtocolError::Xml(e))
    }
}

impl From<idna::Errors> for Error {
    fn from(_e: idna::Errors) -> Self {
        Error::Idna
    }
}

impl From<DnsResolveError> for Error {
    fn from(e: DnsResolveError) -> Error {
        Error::Resolve(e)
    }
}

impl From<DnsProtoError> for Error {
    fn from(e: DnsProtoError) -> Error {
        Error::Dns(e)
    }
}

/// XMPP protocol-level error
#[derive(Debug)]
pub enum ProtocolError {
    /// XML parser error
    Xml(quick_xml::Error),
    /// Encountered an element the stream-level dispatch does not know
    UnexpectedElement {
        /// Resolved namespace of the offending element
        ns: String,
        /// Local name of the offending element
        local: String,
    },
    /// The peer did not open its side of the stream with `<stream:stream>`
    InvalidStreamHeader,
    /// `<stream:error/>` received while negotiating
    Stream(crate::stanza::StreamError),
    /// Non-`result` IQ, or missing `<jid>`, in response to resource binding
    BindFailed,
    /// Non-`result` IQ in response to session establishment
    SessionFailed,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProtocolError::Xml(e) => write!(fmt, "XML parser error: {}", e),
            ProtocolError::UnexpectedElement { ns, local } => {
                write!(fmt, "unexpected element {}:{}", ns, local)
            }
            ProtocolError::InvalidStreamHeader => write!(fmt, "expected <stream:stream>"),
            ProtocolError::Stream(e) => write!(fmt, "stream error: {}", e.condition),
            ProtocolError::BindFailed => write!(fmt, "invalid response to resource binding"),
            ProtocolError::SessionFailed => write!(fmt, "invalid response to session request"),
        }
    }
}

impl StdError for ProtocolError {}

impl From<quick_xml::Error> for ProtocolError {
    fn from(e: quick_xml::Error) -> Self {
        ProtocolError::Xml(e)
    }
}

/// Authentication error
#[derive(Debug)]
pub enum AuthError {
    /// None of the advertised SASL mechanisms is supported locally
    Unsupported(Vec<String>),
    /// `<failure>` from the server; carries the inner element's local name
    Fail(String),
    /// Challenge payload that is not valid base64 / UTF-8
    BadChallenge,
}

impl StdError for AuthError {}

impl fmt::Display for AuthError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuthError::Unsupported(mechs) => {
                write!(fmt, "no matching SASL mechanism available: {:?}", mechs)
            }
            AuthError::Fail(condition) => write!(fmt, "failure from the server: {}", condition),
            AuthError::BadChallenge => write!(fmt, "malformed SASL challenge"),
        }
    }
}
