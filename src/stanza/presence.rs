use super::{push_opt_attr, push_opt_text_element, StanzaError};

/// The `type` attribute of a `<presence/>` stanza.
///
/// An absent attribute means "available" and is represented as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresenceType {
    /// No `type` attribute: the entity is available
    #[default]
    None,
    /// Delivery or processing error
    Error,
    /// Server-side probe for current presence
    Probe,
    /// Request to subscribe to the recipient's presence
    Subscribe,
    /// Subscription request granted
    Subscribed,
    /// The entity is going offline
    Unavailable,
    /// Request to unsubscribe from the recipient's presence
    Unsubscribe,
    /// Subscription cancelled
    Unsubscribed,
}

impl PresenceType {
    /// Map an attribute value onto a type; unknown values are treated as
    /// plain available presence.
    pub fn from_attr(value: &str) -> Self {
        match value {
            "error" => PresenceType::Error,
            "probe" => PresenceType::Probe,
            "subscribe" => PresenceType::Subscribe,
            "subscribed" => PresenceType::Subscribed,
            "unavailable" => PresenceType::Unavailable,
            "unsubscribe" => PresenceType::Unsubscribe,
            "unsubscribed" => PresenceType::Unsubscribed,
            _ => PresenceType::None,
        }
    }

    /// The attribute value for this type; `None` for available presence,
    /// which carries no attribute at all.
    pub fn as_str(self) -> Option<&'static str> {
        match self {
            PresenceType::None => None,
            PresenceType::Error => Some("error"),
            PresenceType::Probe => Some("probe"),
            PresenceType::Subscribe => Some("subscribe"),
            PresenceType::Subscribed => Some("subscribed"),
            PresenceType::Unavailable => Some("unavailable"),
            PresenceType::Unsubscribe => Some("unsubscribe"),
            PresenceType::Unsubscribed => Some("unsubscribed"),
        }
    }
}

/// An RFC 3921 `<presence/>` stanza.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Presence {
    /// Sender JID
    pub from: Option<String>,
    /// Stanza id
    pub id: Option<String>,
    /// Recipient JID
    pub to: Option<String>,
    /// Presence type
    pub type_: PresenceType,
    /// `<show/>` text: away, chat, dnd or xa
    pub show: Option<String>,
    /// `<status/>` text
    pub status: Option<String>,
    /// `<priority/>` value
    pub priority: Option<i8>,
    /// `<error/>` child on type="error" presence
    pub error: Option<StanzaError>,
}

impl Presence {
    /// Available presence with a human-readable status line.
    pub fn status(status: impl Into<String>) -> Presence {
        Presence {
            status: Some(status.into()),
            ..Presence::default()
        }
    }

    /// Presence of the given type addressed to `to`, as used for the
    /// subscription workflow.
    pub fn to(to: impl Into<String>, type_: PresenceType) -> Presence {
        Presence {
            to: Some(to.into()),
            type_,
            ..Presence::default()
        }
    }

    pub(crate) fn write_xml(&self, out: &mut String) {
        out.push_str("<presence");
        push_opt_attr(out, "from", self.from.as_deref());
        push_opt_attr(out, "id", self.id.as_deref());
        push_opt_attr(out, "to", self.to.as_deref());
        push_opt_attr(out, "type", self.type_.as_str());
        let priority = self.priority.map(|p| p.to_string());
        if self.show.is_none() && self.status.is_none() && priority.is_none() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        push_opt_text_element(out, "show", self.show.as_deref());
        push_opt_text_element(out, "status", self.status.as_deref());
        push_opt_text_element(out, "priority", priority.as_deref());
        out.push_str("</presence>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xml(presence: &Presence) -> String {
        let mut out = String::new();
        presence.write_xml(&mut out);
        out
    }

    #[test]
    fn empty_presence_is_self_closing() {
        assert_eq!(xml(&Presence::default()), "<presence/>");
    }

    #[test]
    fn subscribed_reply() {
        let presence = Presence::to("a@x", PresenceType::Subscribed);
        assert_eq!(xml(&presence), "<presence to='a@x' type='subscribed'/>");
    }

    #[test]
    fn status_presence() {
        let presence = Presence::status("gone fishing");
        assert_eq!(xml(&presence), "<presence><status>gone fishing</status></presence>");
    }
}
