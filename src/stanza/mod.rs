//! Typed stanzas and stream-level elements.
//!
//! Everything a client can read from, or write into, an open
//! `<stream:stream>` is represented here as a closed set of types; the
//! wire codec dispatches on `(namespace, local-name)` into this set.

mod error;
mod features;
mod iq;
mod message;
mod presence;

pub use self::error::{StanzaError, StreamError};
pub use self::features::StreamFeatures;
pub use self::iq::{Bind, Iq, IqPayload, IqType, Roster, RosterItem};
pub use self::message::{Message, MessageType};
pub use self::presence::{Presence, PresenceType};

use crate::ns;
use crate::util::xml_escape;

/// Any element that may appear as a direct child of `<stream:stream>`.
///
/// `Message`, `Presence` and `Iq` are the RFC 3921 stanzas applications
/// send and receive; the remaining variants are stream negotiation
/// elements the login sequence consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum Stanza {
    /// `<message/>` in `jabber:client`
    Message(Message),
    /// `<presence/>` in `jabber:client`
    Presence(Presence),
    /// `<iq/>` in `jabber:client`
    Iq(Iq),
    /// Top-level `<error/>` in `jabber:client`
    Error(StanzaError),
    /// `<stream:features/>`
    StreamFeatures(StreamFeatures),
    /// `<stream:error/>`
    StreamError(StreamError),
    /// `<proceed/>` in the TLS namespace
    TlsProceed,
    /// `<failure/>` in the TLS namespace
    TlsFailure,
    /// `<challenge/>` in the SASL namespace; carries the base64 payload
    SaslChallenge(String),
    /// `<response/>` in the SASL namespace; carries the base64 payload
    SaslResponse(String),
    /// `<success/>` in the SASL namespace
    SaslSuccess,
    /// `<failure/>` in the SASL namespace; carries the local name of the
    /// inner condition element, empty when the server sent none
    SaslFailure(String),
    /// `<abort/>` in the SASL namespace
    SaslAbort,
}

impl Stanza {
    /// The `(namespace, local-name)` pair this variant was decoded from.
    pub fn name(&self) -> (&'static str, &'static str) {
        match self {
            Stanza::Message(_) => (ns::JABBER_CLIENT, "message"),
            Stanza::Presence(_) => (ns::JABBER_CLIENT, "presence"),
            Stanza::Iq(_) => (ns::JABBER_CLIENT, "iq"),
            Stanza::Error(_) => (ns::JABBER_CLIENT, "error"),
            Stanza::StreamFeatures(_) => (ns::STREAM, "features"),
            Stanza::StreamError(_) => (ns::STREAM, "error"),
            Stanza::TlsProceed => (ns::TLS, "proceed"),
            Stanza::TlsFailure => (ns::TLS, "failure"),
            Stanza::SaslChallenge(_) => (ns::SASL, "challenge"),
            Stanza::SaslResponse(_) => (ns::SASL, "response"),
            Stanza::SaslSuccess => (ns::SASL, "success"),
            Stanza::SaslFailure(_) => (ns::SASL, "failure"),
            Stanza::SaslAbort => (ns::SASL, "abort"),
        }
    }

    /// Serialize into its on-the-wire XML form.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        match self {
            Stanza::Message(message) => message.write_xml(&mut out),
            Stanza::Presence(presence) => presence.write_xml(&mut out),
            Stanza::Iq(iq) => iq.write_xml(&mut out),
            Stanza::Error(error) => error.write_xml(&mut out),
            Stanza::StreamFeatures(features) => features.write_xml(&mut out),
            Stanza::StreamError(error) => {
                out.push_str("<stream:error>");
                if !error.condition.is_empty() {
                    out.push('<');
                    out.push_str(&error.condition);
                    out.push_str("/>");
                }
                out.push_str("</stream:error>");
            }
            Stanza::TlsProceed => {
                push_empty_ns(&mut out, "proceed", ns::TLS);
            }
            Stanza::TlsFailure => {
                push_empty_ns(&mut out, "failure", ns::TLS);
            }
            Stanza::SaslChallenge(data) => push_text_ns(&mut out, "challenge", ns::SASL, data),
            Stanza::SaslResponse(data) => push_text_ns(&mut out, "response", ns::SASL, data),
            Stanza::SaslSuccess => push_empty_ns(&mut out, "success", ns::SASL),
            Stanza::SaslFailure(condition) => {
                if condition.is_empty() {
                    push_empty_ns(&mut out, "failure", ns::SASL);
                } else {
                    out.push_str("<failure xmlns='");
                    out.push_str(ns::SASL);
                    out.push_str("'><");
                    out.push_str(condition);
                    out.push_str("/></failure>");
                }
            }
            Stanza::SaslAbort => push_empty_ns(&mut out, "abort", ns::SASL),
        }
        out
    }
}

impl From<Message> for Stanza {
    fn from(other: Message) -> Self {
        Self::Message(other)
    }
}

impl From<Presence> for Stanza {
    fn from(other: Presence) -> Self {
        Self::Presence(other)
    }
}

impl From<Iq> for Stanza {
    fn from(other: Iq) -> Self {
        Self::Iq(other)
    }
}

impl TryFrom<Stanza> for Message {
    type Error = Stanza;

    fn try_from(other: Stanza) -> Result<Self, Stanza> {
        match other {
            Stanza::Message(st) => Ok(st),
            other => Err(other),
        }
    }
}

impl TryFrom<Stanza> for Presence {
    type Error = Stanza;

    fn try_from(other: Stanza) -> Result<Self, Stanza> {
        match other {
            Stanza::Presence(st) => Ok(st),
            other => Err(other),
        }
    }
}

impl TryFrom<Stanza> for Iq {
    type Error = Stanza;

    fn try_from(other: Stanza) -> Result<Self, Stanza> {
        match other {
            Stanza::Iq(st) => Ok(st),
            other => Err(other),
        }
    }
}

pub(crate) fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("='");
    out.push_str(&xml_escape(value));
    out.push('\'');
}

pub(crate) fn push_opt_attr(out: &mut String, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        push_attr(out, name, value);
    }
}

pub(crate) fn push_text_element(out: &mut String, name: &str, value: &str) {
    out.push('<');
    out.push_str(name);
    out.push('>');
    out.push_str(&xml_escape(value));
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

pub(crate) fn push_opt_text_element(out: &mut String, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        push_text_element(out, name, value);
    }
}

fn push_empty_ns(out: &mut String, name: &str, xmlns: &str) {
    out.push('<');
    out.push_str(name);
    out.push_str(" xmlns='");
    out.push_str(xmlns);
    out.push_str("'/>");
}

fn push_text_ns(out: &mut String, name: &str, xmlns: &str, text: &str) {
    out.push('<');
    out.push_str(name);
    out.push_str(" xmlns='");
    out.push_str(xmlns);
    out.push_str("'>");
    out.push_str(&xml_escape(text));
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}
