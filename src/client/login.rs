//! One-shot stream negotiation over a fresh transport.
//!
//! Fixed order per RFC 3920: open the stream and read features, upgrade to
//! TLS when offered (restarting the stream on the new transport),
//! authenticate, restart the stream again, then bind a resource and
//! establish the session when those are offered.

use log::debug;

use crate::auth::{self, Mechanism};
use crate::codec::Codec;
use crate::connect::{starttls, StartTlsError, Transport};
use crate::error::{AuthError, Error, ProtocolError};
use crate::ns;
use crate::stanza::{IqPayload, IqType, Stanza, StreamFeatures};

pub(crate) struct Negotiated {
    pub codec: Codec,
    /// Server-assigned full JID, when resource binding was offered.
    pub bound_jid: Option<String>,
}

/// Run the whole handshake. Any unexpected element or stream error on the
/// way is fatal for this transport and surfaces to the caller.
pub(crate) async fn login(
    transport: Transport,
    username: &str,
    domain: &str,
    password: &str,
) -> Result<Negotiated, Error> {
    let mut codec = Codec::new(transport);
    let mut features = open_stream(&mut codec, domain).await?;

    if features.can_starttls() {
        codec.write_starttls().await?;
        match codec.next_stanza().await? {
            Stanza::TlsProceed => {}
            Stanza::TlsFailure => return Err(StartTlsError::Refused.into()),
            other => return Err(unexpected(other)),
        }
        let upgraded = starttls(codec.into_inner(), domain).await?;
        debug!("TLS established towards {}", domain);
        codec = Codec::new(upgraded);
        features = open_stream(&mut codec, domain).await?;
    }

    authenticate(&mut codec, &features, username, domain, password).await?;

    // Authenticated: the stream restarts on the same transport.
    codec = codec.reset();
    let features = open_stream(&mut codec, domain).await?;

    let bound_jid = if features.can_bind() {
        Some(bind(&mut codec).await?)
    } else {
        None
    };
    if features.can_session() {
        session(&mut codec).await?;
    }

    Ok(Negotiated { codec, bound_jid })
}

/// Send our stream header, read the peer's, and return its features.
async fn open_stream(codec: &mut Codec, domain: &str) -> Result<StreamFeatures, Error> {
    codec.write_stream_header(domain).await?;
    codec.read_stream_header().await?;
    match codec.next_stanza().await? {
        Stanza::StreamFeatures(features) => Ok(features),
        Stanza::StreamError(error) => Err(ProtocolError::Stream(error).into()),
        other => Err(unexpected(other)),
    }
}

async fn authenticate(
    codec: &mut Codec,
    features: &StreamFeatures,
    username: &str,
    domain: &str,
    password: &str,
) -> Result<(), Error> {
    let mechanism = auth::select_mechanism(&features.mechanisms)?;
    debug!("authenticating via {}", mechanism.name());
    match mechanism {
        Mechanism::Plain => {
            let initial = auth::plain_initial(username, password);
            codec.write_auth(mechanism.name(), Some(&initial)).await?;
        }
        Mechanism::DigestMd5 => {
            codec.write_auth(mechanism.name(), None).await?;
            let challenge = match codec.next_stanza().await? {
                Stanza::SaslChallenge(data) => data,
                Stanza::SaslFailure(condition) => return Err(AuthError::Fail(condition).into()),
                other => return Err(unexpected(other)),
            };
            let reply = auth::digest_md5_reply(&challenge, username, password, domain)?;
            codec.write_sasl_response(&reply).await?;
        }
    }

    // The server's rspauth challenge is not consumed; the next element is
    // expected to be <success/> or <failure/> directly.
    match codec.next_stanza().await? {
        Stanza::SaslSuccess => Ok(()),
        Stanza::SaslFailure(condition) => Err(AuthError::Fail(condition).into()),
        other => Err(unexpected(other)),
    }
}

/// Bind a server-chosen resource; returns the full JID the server
/// assigned.
async fn bind(codec: &mut Codec) -> Result<String, Error> {
    codec
        .write_raw(&format!("<iq type='set' id='x'><bind xmlns='{}'/></iq>\n", ns::BIND))
        .await?;
    match codec.next_stanza().await? {
        Stanza::Iq(iq) if iq.type_ == IqType::Result => match iq.payload {
            Some(IqPayload::Bind(bind)) => match bind.jid {
                Some(jid) => {
                    debug!("bound as {}", jid);
                    Ok(jid)
                }
                None => Err(ProtocolError::BindFailed.into()),
            },
            _ => Err(ProtocolError::BindFailed.into()),
        },
        Stanza::Iq(_) => Err(ProtocolError::BindFailed.into()),
        other => Err(unexpected(other)),
    }
}

async fn session(codec: &mut Codec) -> Result<(), Error> {
    codec
        .write_raw(&format!(
            "<iq type='set' id='x'><session xmlns='{}'/></iq>\n",
            ns::SESSION
        ))
        .await?;
    match codec.next_stanza().await? {
        Stanza::Iq(iq) if iq.type_ == IqType::Result => Ok(()),
        Stanza::Iq(_) => Err(ProtocolError::SessionFailed.into()),
        other => Err(unexpected(other)),
    }
}

fn unexpected(stanza: Stanza) -> Error {
    let (ns, local) = stanza.name();
    ProtocolError::UnexpectedElement {
        ns: ns.to_owned(),
        local: local.to_owned(),
    }
    .into()
}
