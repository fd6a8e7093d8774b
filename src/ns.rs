//! XML namespaces used by RFC 3920/3921 streams.

/// `http://etherx.jabber.org/streams`
pub const STREAM: &str = "http://etherx.jabber.org/streams";

/// `urn:ietf:params:xml:ns:xmpp-tls`
pub const TLS: &str = "urn:ietf:params:xml:ns:xmpp-tls";

/// `urn:ietf:params:xml:ns:xmpp-sasl`
pub const SASL: &str = "urn:ietf:params:xml:ns:xmpp-sasl";

/// `urn:ietf:params:xml:ns:xmpp-bind`
pub const BIND: &str = "urn:ietf:params:xml:ns:xmpp-bind";

/// `urn:ietf:params:xml:ns:xmpp-session`
pub const SESSION: &str = "urn:ietf:params:xml:ns:xmpp-session";

/// `jabber:client`
pub const JABBER_CLIENT: &str = "jabber:client";

/// `jabber:iq:roster`
pub const ROSTER: &str = "jabber:iq:roster";

/// `urn:xmpp:ping`
pub const PING: &str = "urn:xmpp:ping";
