use super::{push_attr, push_opt_attr, StanzaError};
use crate::ns;
use crate::util::xml_escape;

/// The `type` attribute of an `<iq/>` stanza.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IqType {
    /// Request for information
    #[default]
    Get,
    /// Request to set or replace information
    Set,
    /// Successful response
    Result,
    /// Error response
    Error,
}

impl IqType {
    /// Map an attribute value onto a type, defaulting to `Get`.
    pub fn from_attr(value: &str) -> Self {
        match value {
            "set" => IqType::Set,
            "result" => IqType::Result,
            "error" => IqType::Error,
            _ => IqType::Get,
        }
    }

    /// The attribute value for this type.
    pub fn as_str(self) -> &'static str {
        match self {
            IqType::Get => "get",
            IqType::Set => "set",
            IqType::Result => "result",
            IqType::Error => "error",
        }
    }
}

/// The recognised payload of an `<iq/>` stanza.
#[derive(Debug, Clone, PartialEq)]
pub enum IqPayload {
    /// `<bind/>` in the bind namespace
    Bind(Bind),
    /// `<query/>` in `jabber:iq:roster`
    Roster(Roster),
    /// `<ping/>` in `urn:xmpp:ping`
    Ping,
    /// `<error/>` child of an error response
    Error(StanzaError),
}

/// An RFC 3921 `<iq/>` stanza with an optional recognised payload.
///
/// Payload children outside the recognised set are skipped on decode and
/// leave `payload` as `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Iq {
    /// Sender JID
    pub from: Option<String>,
    /// Stanza id, used to correlate request and response
    pub id: String,
    /// Recipient JID
    pub to: Option<String>,
    /// IQ type
    pub type_: IqType,
    /// Recognised payload, if any
    pub payload: Option<IqPayload>,
}

impl Iq {
    /// A `get` request carrying `payload`.
    pub fn get(id: impl Into<String>, payload: IqPayload) -> Iq {
        Iq {
            id: id.into(),
            type_: IqType::Get,
            payload: Some(payload),
            ..Iq::default()
        }
    }

    /// A `set` request carrying `payload`.
    pub fn set(id: impl Into<String>, payload: IqPayload) -> Iq {
        Iq {
            id: id.into(),
            type_: IqType::Set,
            payload: Some(payload),
            ..Iq::default()
        }
    }

    pub(crate) fn write_xml(&self, out: &mut String) {
        out.push_str("<iq");
        push_opt_attr(out, "from", self.from.as_deref());
        if !self.id.is_empty() {
            push_attr(out, "id", &self.id);
        }
        push_opt_attr(out, "to", self.to.as_deref());
        push_attr(out, "type", self.type_.as_str());
        let payload = match &self.payload {
            None => {
                out.push_str("/>");
                return;
            }
            Some(payload) => payload,
        };
        out.push('>');
        match payload {
            IqPayload::Bind(bind) => bind.write_xml(out),
            IqPayload::Roster(roster) => roster.write_xml(out),
            IqPayload::Ping => {
                out.push_str("<ping xmlns='");
                out.push_str(ns::PING);
                out.push_str("'/>");
            }
            IqPayload::Error(error) => error.write_xml(out),
        }
        out.push_str("</iq>");
    }
}

/// `<bind/>` payload from the bind namespace.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bind {
    /// Client-requested resource, on requests
    pub resource: Option<String>,
    /// Server-assigned full JID, on responses
    pub jid: Option<String>,
}

impl Bind {
    pub(crate) fn write_xml(&self, out: &mut String) {
        out.push_str("<bind xmlns='");
        out.push_str(ns::BIND);
        out.push('\'');
        if self.resource.is_none() && self.jid.is_none() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        super::push_opt_text_element(out, "resource", self.resource.as_deref());
        super::push_opt_text_element(out, "jid", self.jid.as_deref());
        out.push_str("</bind>");
    }
}

/// `<query/>` payload from `jabber:iq:roster`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Roster {
    /// Contact list entries
    pub items: Vec<RosterItem>,
}

impl Roster {
    pub(crate) fn write_xml(&self, out: &mut String) {
        out.push_str("<query xmlns='");
        out.push_str(ns::ROSTER);
        out.push('\'');
        if self.items.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for item in &self.items {
            item.write_xml(out);
        }
        out.push_str("</query>");
    }
}

/// A single roster `<item/>`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RosterItem {
    /// Contact JID
    pub jid: String,
    /// Display name, if set
    pub name: Option<String>,
    /// Subscription state: none, to, from, both or remove
    pub subscription: Option<String>,
    /// Pending subscription request marker
    pub ask: Option<String>,
    /// Roster groups this item belongs to
    pub groups: Vec<String>,
}

impl RosterItem {
    fn write_xml(&self, out: &mut String) {
        out.push_str("<item");
        push_attr(out, "jid", &self.jid);
        push_opt_attr(out, "name", self.name.as_deref());
        push_opt_attr(out, "subscription", self.subscription.as_deref());
        push_opt_attr(out, "ask", self.ask.as_deref());
        if self.groups.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for group in &self.groups {
            out.push_str("<group>");
            out.push_str(&xml_escape(group));
            out.push_str("</group>");
        }
        out.push_str("</item>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xml(iq: &Iq) -> String {
        let mut out = String::new();
        iq.write_xml(&mut out);
        out
    }

    #[test]
    fn ping_request() {
        let iq = Iq {
            id: "p1".into(),
            to: Some("example.com".into()),
            type_: IqType::Get,
            payload: Some(IqPayload::Ping),
            ..Iq::default()
        };
        assert_eq!(
            xml(&iq),
            "<iq id='p1' to='example.com' type='get'><ping xmlns='urn:xmpp:ping'/></iq>"
        );
    }

    #[test]
    fn roster_request_is_empty_query() {
        let iq = Iq::get("r1", IqPayload::Roster(Roster::default()));
        assert_eq!(
            xml(&iq),
            "<iq id='r1' type='get'><query xmlns='jabber:iq:roster'/></iq>"
        );
    }

    #[test]
    fn bind_request_is_empty_bind() {
        let iq = Iq::set("b1", IqPayload::Bind(Bind::default()));
        assert_eq!(
            xml(&iq),
            "<iq id='b1' type='set'><bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'/></iq>"
        );
    }
}
