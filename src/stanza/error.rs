use super::{push_opt_attr, push_opt_text_element};

/// `<error/>` in `jabber:client`, carried by error stanzas.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StanzaError {
    /// Legacy numeric code attribute
    pub code: Option<String>,
    /// Error class: cancel, continue, modify, auth or wait
    pub type_: Option<String>,
    /// Local name of the defined-condition child, e.g.
    /// `feature-not-implemented`
    pub condition: Option<String>,
    /// `<text/>` child
    pub text: Option<String>,
}

impl StanzaError {
    pub(crate) fn write_xml(&self, out: &mut String) {
        out.push_str("<error");
        push_opt_attr(out, "code", self.code.as_deref());
        push_opt_attr(out, "type", self.type_.as_deref());
        if self.condition.is_none() && self.text.is_none() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        if let Some(condition) = &self.condition {
            out.push('<');
            out.push_str(condition);
            out.push_str("/>");
        }
        push_opt_text_element(out, "text", self.text.as_deref());
        out.push_str("</error>");
    }
}

/// `<stream:error/>`: the peer is about to kill the stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamError {
    /// Local name of the defined-condition child, e.g. `conflict`
    pub condition: String,
    /// `<text/>` child
    pub text: Option<String>,
}
