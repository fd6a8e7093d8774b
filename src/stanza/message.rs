use super::{push_opt_attr, push_opt_text_element};

/// The `type` attribute of a `<message/>` stanza.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageType {
    /// One-to-one chat
    Chat,
    /// Delivery or processing error
    Error,
    /// Multi-user chat
    Groupchat,
    /// Broadcast-style notice
    Headline,
    /// Anything else; also the RFC 3921 default when the attribute is
    /// absent or unknown
    #[default]
    Normal,
}

impl MessageType {
    /// Map an attribute value onto a type, defaulting to `Normal`.
    pub fn from_attr(value: &str) -> Self {
        match value {
            "chat" => MessageType::Chat,
            "error" => MessageType::Error,
            "groupchat" => MessageType::Groupchat,
            "headline" => MessageType::Headline,
            _ => MessageType::Normal,
        }
    }

    /// The attribute value for this type.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Chat => "chat",
            MessageType::Error => "error",
            MessageType::Groupchat => "groupchat",
            MessageType::Headline => "headline",
            MessageType::Normal => "normal",
        }
    }
}

/// An RFC 3921 `<message/>` stanza.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    /// Sender JID
    pub from: Option<String>,
    /// Stanza id
    pub id: Option<String>,
    /// Recipient JID
    pub to: Option<String>,
    /// Message type
    pub type_: MessageType,
    /// `<subject/>` text
    pub subject: Option<String>,
    /// `<body/>` text
    pub body: Option<String>,
    /// `<thread/>` text
    pub thread: Option<String>,
}

impl Message {
    /// A one-to-one chat message to `to`.
    pub fn chat(to: impl Into<String>, body: impl Into<String>) -> Message {
        Message {
            to: Some(to.into()),
            type_: MessageType::Chat,
            body: Some(body.into()),
            ..Message::default()
        }
    }

    pub(crate) fn write_xml(&self, out: &mut String) {
        out.push_str("<message");
        push_opt_attr(out, "from", self.from.as_deref());
        push_opt_attr(out, "id", self.id.as_deref());
        push_opt_attr(out, "to", self.to.as_deref());
        super::push_attr(out, "type", self.type_.as_str());
        if self.subject.is_none() && self.body.is_none() && self.thread.is_none() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        push_opt_text_element(out, "subject", self.subject.as_deref());
        push_opt_text_element(out, "body", self.body.as_deref());
        push_opt_text_element(out, "thread", self.thread.as_deref());
        out.push_str("</message>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xml(message: &Message) -> String {
        let mut out = String::new();
        message.write_xml(&mut out);
        out
    }

    #[test]
    fn chat_message_serializes() {
        let message = Message::chat("juliet@capulet.com", "wherefore art thou");
        assert_eq!(
            xml(&message),
            "<message to='juliet@capulet.com' type='chat'><body>wherefore art thou</body></message>"
        );
    }

    #[test]
    fn body_is_escaped() {
        let message = Message::chat("a@b", "1 < 2 & \"so on\"");
        assert!(xml(&message).contains("<body>1 &lt; 2 &amp; &quot;so on&quot;</body>"));
    }

    #[test]
    fn unknown_type_defaults_to_normal() {
        assert_eq!(MessageType::from_attr("carbon-copy"), MessageType::Normal);
        assert_eq!(MessageType::from_attr("chat"), MessageType::Chat);
    }
}
