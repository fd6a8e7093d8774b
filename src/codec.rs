//! Wire codec: decoding typed stanzas from, and writing fragments onto,
//! an open XML stream.
//!
//! The read side keeps one namespace-aware parser alive per transport, so
//! after stream setup the cursor always sits inside the outer
//! `<stream:stream>` element waiting for child elements. A stream restart
//! (after STARTTLS or after authentication) drops the parser state
//! explicitly via [`Codec::reset`] while keeping already-buffered bytes.
//!
//! The write side emits whole fragments: either raw negotiation snippets
//! (stream header, `<starttls/>`, SASL envelopes) or serialized stanzas.
//! Every write is flushed down to the transport before returning.

use log::trace;
use quick_xml::events::{BytesStart, Event as XmlEvent};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};

use crate::connect::Transport;
use crate::error::{Error, ProtocolError};
use crate::ns;
use crate::stanza::{
    Bind, Iq, IqPayload, IqType, Message, MessageType, Presence, PresenceType, Roster, RosterItem,
    Stanza, StanzaError, StreamError, StreamFeatures,
};
use crate::util::xml_escape;

/// Owned event summary, decoupled from the parser's internal buffers.
#[derive(Debug)]
enum Node {
    Start {
        ns: String,
        local: String,
        element: BytesStart<'static>,
    },
    Empty {
        ns: String,
        local: String,
        element: BytesStart<'static>,
    },
    End,
    Text(String),
    /// Declarations, comments, processing instructions
    Skip,
    Eof,
}

/// Decodes stanzas from the read half of a connection.
pub struct StanzaReader<R> {
    inner: NsReader<BufReader<R>>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin + Send> StanzaReader<R> {
    /// Wrap a read half in a fresh parser.
    pub fn new(inner: R) -> Self {
        StanzaReader {
            inner: NsReader::from_reader(BufReader::new(inner)),
            buf: Vec::new(),
        }
    }

    /// Drop all parser state, keeping the transport and any bytes it has
    /// already buffered. The stream must be restarted with a new header
    /// afterwards.
    pub fn reset(self) -> Self {
        StanzaReader {
            inner: NsReader::from_reader(self.inner.into_inner()),
            buf: Vec::new(),
        }
    }

    /// Recover the underlying read half, discarding parser state.
    pub fn into_inner(self) -> R {
        self.inner.into_inner().into_inner()
    }

    async fn step(&mut self) -> Result<Node, Error> {
        self.buf.clear();
        let (resolve, event) = self
            .inner
            .read_resolved_event_into_async(&mut self.buf)
            .await
            .map_err(ProtocolError::Xml)?;
        Ok(match event {
            XmlEvent::Start(e) => Node::Start {
                ns: resolved_ns(&resolve),
                local: local_name(&e),
                element: e.into_owned(),
            },
            XmlEvent::Empty(e) => Node::Empty {
                ns: resolved_ns(&resolve),
                local: local_name(&e),
                element: e.into_owned(),
            },
            XmlEvent::End(_) => Node::End,
            XmlEvent::Text(t) => Node::Text(
                t.unescape()
                    .map_err(|e| ProtocolError::Xml(e.into()))?
                    .into_owned(),
            ),
            XmlEvent::CData(t) => Node::Text(String::from_utf8_lossy(&t.into_inner()).into_owned()),
            XmlEvent::Decl(_) | XmlEvent::Comment(_) | XmlEvent::PI(_) | XmlEvent::DocType(_) => {
                Node::Skip
            }
            XmlEvent::Eof => Node::Eof,
        })
    }

    /// Read the peer's `<stream:stream>` header. Must be called once after
    /// construction or reset, before [`next_stanza`][Self::next_stanza].
    pub async fn read_stream_header(&mut self) -> Result<(), Error> {
        loop {
            match self.step().await? {
                Node::Start { ns, local, .. } | Node::Empty { ns, local, .. } => {
                    if ns == ns::STREAM && local == "stream" {
                        return Ok(());
                    }
                    return Err(ProtocolError::InvalidStreamHeader.into());
                }
                Node::Text(_) | Node::Skip => {}
                Node::End | Node::Eof => return Err(Error::Disconnected),
            }
        }
    }

    /// Advance to the next child element of `<stream:stream>` and decode
    /// it. `Err(Error::Disconnected)` when the peer closes its side.
    pub async fn next_stanza(&mut self) -> Result<Stanza, Error> {
        loop {
            match self.step().await? {
                Node::Start { ns, local, element } => {
                    let stanza = self.decode(&ns, &local, element, false).await?;
                    trace!("RECV {}", stanza.to_xml());
                    return Ok(stanza);
                }
                Node::Empty { ns, local, element } => {
                    let stanza = self.decode(&ns, &local, element, true).await?;
                    trace!("RECV {}", stanza.to_xml());
                    return Ok(stanza);
                }
                // whitespace keepalives between stanzas
                Node::Text(_) | Node::Skip => {}
                // </stream:stream> or transport EOF
                Node::End | Node::Eof => return Err(Error::Disconnected),
            }
        }
    }

    async fn decode(
        &mut self,
        ns: &str,
        local: &str,
        element: BytesStart<'static>,
        empty: bool,
    ) -> Result<Stanza, Error> {
        match (ns, local) {
            (ns::STREAM, "features") => {
                Ok(Stanza::StreamFeatures(self.decode_features(empty).await?))
            }
            (ns::STREAM, "error") => Ok(Stanza::StreamError(self.decode_stream_error(empty).await?)),
            (ns::TLS, "proceed") => {
                self.consume(empty).await?;
                Ok(Stanza::TlsProceed)
            }
            (ns::TLS, "failure") => {
                self.consume(empty).await?;
                Ok(Stanza::TlsFailure)
            }
            (ns::SASL, "challenge") => Ok(Stanza::SaslChallenge(self.text_content(empty).await?)),
            (ns::SASL, "response") => Ok(Stanza::SaslResponse(self.text_content(empty).await?)),
            (ns::SASL, "success") => {
                self.consume(empty).await?;
                Ok(Stanza::SaslSuccess)
            }
            (ns::SASL, "failure") => Ok(Stanza::SaslFailure(self.first_child_name(empty).await?)),
            (ns::SASL, "abort") => {
                self.consume(empty).await?;
                Ok(Stanza::SaslAbort)
            }
            (ns::JABBER_CLIENT, "message") => {
                Ok(Stanza::Message(self.decode_message(&element, empty).await?))
            }
            (ns::JABBER_CLIENT, "presence") => {
                Ok(Stanza::Presence(self.decode_presence(&element, empty).await?))
            }
            (ns::JABBER_CLIENT, "iq") => Ok(Stanza::Iq(self.decode_iq(&element, empty).await?)),
            (ns::JABBER_CLIENT, "error") => {
                Ok(Stanza::Error(self.decode_stanza_error(&element, empty).await?))
            }
            (ns, local) => {
                // Leave the element on the wire unconsumed; this stream is
                // done for anyway.
                Err(ProtocolError::UnexpectedElement {
                    ns: ns.to_owned(),
                    local: local.to_owned(),
                }
                .into())
            }
        }
    }

    /// Consume the rest of an element whose start tag has been read.
    async fn consume(&mut self, empty: bool) -> Result<(), Error> {
        if empty {
            return Ok(());
        }
        let mut depth = 1usize;
        loop {
            match self.step().await? {
                Node::Start { .. } => depth += 1,
                Node::End => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Node::Eof => return Err(Error::Disconnected),
                Node::Empty { .. } | Node::Text(_) | Node::Skip => {}
            }
        }
    }

    /// Character content of the current element, consuming through its end
    /// tag. Nested markup is dropped.
    async fn text_content(&mut self, empty: bool) -> Result<String, Error> {
        let mut out = String::new();
        if empty {
            return Ok(out);
        }
        let mut depth = 1usize;
        loop {
            match self.step().await? {
                Node::Text(t) => {
                    if depth == 1 {
                        out.push_str(&t);
                    }
                }
                Node::Start { .. } => depth += 1,
                Node::End => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                }
                Node::Eof => return Err(Error::Disconnected),
                Node::Empty { .. } | Node::Skip => {}
            }
        }
    }

    /// Local name of the first child element, e.g. the defined condition
    /// inside a SASL `<failure/>`. Consumes through the end tag.
    async fn first_child_name(&mut self, empty: bool) -> Result<String, Error> {
        let mut name = String::new();
        if empty {
            return Ok(name);
        }
        loop {
            match self.step().await? {
                Node::Start { local, .. } => {
                    if name.is_empty() {
                        name = local;
                    }
                    self.consume(false).await?;
                }
                Node::Empty { local, .. } => {
                    if name.is_empty() {
                        name = local;
                    }
                }
                Node::End => return Ok(name),
                Node::Eof => return Err(Error::Disconnected),
                Node::Text(_) | Node::Skip => {}
            }
        }
    }

    async fn decode_features(&mut self, empty: bool) -> Result<StreamFeatures, Error> {
        let mut features = StreamFeatures::default();
        if empty {
            return Ok(features);
        }
        loop {
            match self.step().await? {
                Node::Start { ns, local, .. } => match (ns.as_str(), local.as_str()) {
                    (ns::TLS, "starttls") => {
                        features.starttls = true;
                        features.starttls_required = !self.first_child_name(false).await?.is_empty();
                    }
                    (ns::SASL, "mechanisms") => {
                        self.decode_mechanisms(&mut features.mechanisms).await?;
                    }
                    (ns::BIND, "bind") => {
                        features.bind = true;
                        self.consume(false).await?;
                    }
                    (ns::SESSION, "session") => {
                        features.session = true;
                        self.consume(false).await?;
                    }
                    _ => self.consume(false).await?,
                },
                Node::Empty { ns, local, .. } => match (ns.as_str(), local.as_str()) {
                    (ns::TLS, "starttls") => features.starttls = true,
                    (ns::BIND, "bind") => features.bind = true,
                    (ns::SESSION, "session") => features.session = true,
                    _ => {}
                },
                Node::End => return Ok(features),
                Node::Eof => return Err(Error::Disconnected),
                Node::Text(_) | Node::Skip => {}
            }
        }
    }

    async fn decode_mechanisms(&mut self, mechanisms: &mut Vec<String>) -> Result<(), Error> {
        loop {
            match self.step().await? {
                Node::Start { local, .. } => {
                    let text = self.text_content(false).await?;
                    if local == "mechanism" {
                        mechanisms.push(text.trim().to_owned());
                    }
                }
                Node::End => return Ok(()),
                Node::Eof => return Err(Error::Disconnected),
                Node::Empty { .. } | Node::Text(_) | Node::Skip => {}
            }
        }
    }

    async fn decode_stream_error(&mut self, empty: bool) -> Result<StreamError, Error> {
        let mut error = StreamError::default();
        if empty {
            return Ok(error);
        }
        loop {
            match self.step().await? {
                Node::Start { local, .. } => {
                    if local == "text" {
                        error.text = Some(self.text_content(false).await?);
                    } else {
                        if error.condition.is_empty() {
                            error.condition = local;
                        }
                        self.consume(false).await?;
                    }
                }
                Node::Empty { local, .. } => {
                    if local != "text" && error.condition.is_empty() {
                        error.condition = local;
                    }
                }
                Node::End => return Ok(error),
                Node::Eof => return Err(Error::Disconnected),
                Node::Text(_) | Node::Skip => {}
            }
        }
    }

    async fn decode_message(
        &mut self,
        element: &BytesStart<'static>,
        empty: bool,
    ) -> Result<Message, Error> {
        let mut message = Message {
            from: attr(element, "from")?,
            id: attr(element, "id")?,
            to: attr(element, "to")?,
            type_: MessageType::from_attr(attr(element, "type")?.as_deref().unwrap_or("")),
            ..Message::default()
        };
        if empty {
            return Ok(message);
        }
        loop {
            match self.step().await? {
                Node::Start { local, .. } => match local.as_str() {
                    "subject" => message.subject = Some(self.text_content(false).await?),
                    "body" => message.body = Some(self.text_content(false).await?),
                    "thread" => message.thread = Some(self.text_content(false).await?),
                    _ => self.consume(false).await?,
                },
                Node::End => return Ok(message),
                Node::Eof => return Err(Error::Disconnected),
                Node::Empty { .. } | Node::Text(_) | Node::Skip => {}
            }
        }
    }

    async fn decode_presence(
        &mut self,
        element: &BytesStart<'static>,
        empty: bool,
    ) -> Result<Presence, Error> {
        let mut presence = Presence {
            from: attr(element, "from")?,
            id: attr(element, "id")?,
            to: attr(element, "to")?,
            type_: PresenceType::from_attr(attr(element, "type")?.as_deref().unwrap_or("")),
            ..Presence::default()
        };
        if empty {
            return Ok(presence);
        }
        loop {
            match self.step().await? {
                Node::Start { ns, local, element } => match (ns.as_str(), local.as_str()) {
                    (_, "show") => presence.show = Some(self.text_content(false).await?),
                    (_, "status") => presence.status = Some(self.text_content(false).await?),
                    (_, "priority") => {
                        presence.priority = self.text_content(false).await?.trim().parse().ok();
                    }
                    (ns::JABBER_CLIENT, "error") => {
                        presence.error = Some(self.decode_stanza_error(&element, false).await?);
                    }
                    _ => self.consume(false).await?,
                },
                Node::Empty { ns, local, element } => {
                    if (ns.as_str(), local.as_str()) == (ns::JABBER_CLIENT, "error") {
                        presence.error = Some(self.decode_stanza_error(&element, true).await?);
                    }
                }
                Node::End => return Ok(presence),
                Node::Eof => return Err(Error::Disconnected),
                Node::Text(_) | Node::Skip => {}
            }
        }
    }

    async fn decode_iq(
        &mut self,
        element: &BytesStart<'static>,
        empty: bool,
    ) -> Result<Iq, Error> {
        let mut iq = Iq {
            from: attr(element, "from")?,
            id: attr(element, "id")?.unwrap_or_default(),
            to: attr(element, "to")?,
            type_: IqType::from_attr(attr(element, "type")?.as_deref().unwrap_or("")),
            payload: None,
        };
        if empty {
            return Ok(iq);
        }
        loop {
            match self.step().await? {
                Node::Start { ns, local, element } => match (ns.as_str(), local.as_str()) {
                    (ns::BIND, "bind") => {
                        iq.payload = Some(IqPayload::Bind(self.decode_bind().await?));
                    }
                    (ns::ROSTER, "query") => {
                        iq.payload = Some(IqPayload::Roster(self.decode_roster().await?));
                    }
                    (ns::PING, "ping") => {
                        iq.payload = Some(IqPayload::Ping);
                        self.consume(false).await?;
                    }
                    (ns::JABBER_CLIENT, "error") => {
                        iq.payload =
                            Some(IqPayload::Error(self.decode_stanza_error(&element, false).await?));
                    }
                    _ => self.consume(false).await?,
                },
                Node::Empty { ns, local, element } => match (ns.as_str(), local.as_str()) {
                    (ns::BIND, "bind") => iq.payload = Some(IqPayload::Bind(Bind::default())),
                    (ns::ROSTER, "query") => {
                        iq.payload = Some(IqPayload::Roster(Roster::default()));
                    }
                    (ns::PING, "ping") => iq.payload = Some(IqPayload::Ping),
                    (ns::JABBER_CLIENT, "error") => {
                        iq.payload =
                            Some(IqPayload::Error(self.decode_stanza_error(&element, true).await?));
                    }
                    _ => {}
                },
                Node::End => return Ok(iq),
                Node::Eof => return Err(Error::Disconnected),
                Node::Text(_) | Node::Skip => {}
            }
        }
    }

    async fn decode_bind(&mut self) -> Result<Bind, Error> {
        let mut bind = Bind::default();
        loop {
            match self.step().await? {
                Node::Start { local, .. } => match local.as_str() {
                    "jid" => bind.jid = Some(self.text_content(false).await?.trim().to_owned()),
                    "resource" => {
                        bind.resource = Some(self.text_content(false).await?.trim().to_owned());
                    }
                    _ => self.consume(false).await?,
                },
                Node::End => return Ok(bind),
                Node::Eof => return Err(Error::Disconnected),
                Node::Empty { .. } | Node::Text(_) | Node::Skip => {}
            }
        }
    }

    async fn decode_roster(&mut self) -> Result<Roster, Error> {
        let mut roster = Roster::default();
        loop {
            match self.step().await? {
                Node::Start { local, element, .. } => {
                    if local == "item" {
                        roster.items.push(self.decode_roster_item(&element, false).await?);
                    } else {
                        self.consume(false).await?;
                    }
                }
                Node::Empty { local, element, .. } => {
                    if local == "item" {
                        roster.items.push(self.decode_roster_item(&element, true).await?);
                    }
                }
                Node::End => return Ok(roster),
                Node::Eof => return Err(Error::Disconnected),
                Node::Text(_) | Node::Skip => {}
            }
        }
    }

    async fn decode_roster_item(
        &mut self,
        element: &BytesStart<'static>,
        empty: bool,
    ) -> Result<RosterItem, Error> {
        let mut item = RosterItem {
            jid: attr(element, "jid")?.unwrap_or_default(),
            name: attr(element, "name")?,
            subscription: attr(element, "subscription")?,
            ask: attr(element, "ask")?,
            groups: Vec::new(),
        };
        if empty {
            return Ok(item);
        }
        loop {
            match self.step().await? {
                Node::Start { local, .. } => {
                    let text = self.text_content(false).await?;
                    if local == "group" {
                        item.groups.push(text);
                    }
                }
                Node::End => return Ok(item),
                Node::Eof => return Err(Error::Disconnected),
                Node::Empty { .. } | Node::Text(_) | Node::Skip => {}
            }
        }
    }

    async fn decode_stanza_error(
        &mut self,
        element: &BytesStart<'static>,
        empty: bool,
    ) -> Result<StanzaError, Error> {
        let mut error = StanzaError {
            code: attr(element, "code")?,
            type_: attr(element, "type")?,
            ..StanzaError::default()
        };
        if empty {
            return Ok(error);
        }
        loop {
            match self.step().await? {
                Node::Start { local, .. } => {
                    if local == "text" {
                        error.text = Some(self.text_content(false).await?);
                    } else {
                        if error.condition.is_none() {
                            error.condition = Some(local);
                        }
                        self.consume(false).await?;
                    }
                }
                Node::Empty { local, .. } => {
                    if local != "text" && error.condition.is_none() {
                        error.condition = Some(local);
                    }
                }
                Node::End => return Ok(error),
                Node::Eof => return Err(Error::Disconnected),
                Node::Text(_) | Node::Skip => {}
            }
        }
    }
}

fn resolved_ns(resolve: &ResolveResult) -> String {
    match resolve {
        ResolveResult::Bound(ns) => String::from_utf8_lossy(ns.0).into_owned(),
        _ => String::new(),
    }
}

fn local_name(element: &BytesStart) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

fn attr(element: &BytesStart, name: &str) -> Result<Option<String>, Error> {
    for attribute in element.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        if attribute.key.as_ref() == name.as_bytes() {
            let value = attribute
                .unescape_value()
                .map_err(|e| ProtocolError::Xml(e.into()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Serializes fragments onto the write half of a connection.
pub struct StanzaWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin + Send> StanzaWriter<W> {
    /// Wrap a write half.
    pub fn new(inner: W) -> Self {
        StanzaWriter { inner }
    }

    /// Recover the underlying write half.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Write a raw protocol fragment and flush it out.
    pub async fn write_raw(&mut self, fragment: &str) -> Result<(), Error> {
        trace!("SEND {}", fragment);
        self.inner.write_all(fragment.as_bytes()).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Open our side of the stream towards `domain`.
    pub async fn write_stream_header(&mut self, domain: &str) -> Result<(), Error> {
        let header = format!(
            "<?xml version='1.0'?><stream:stream to='{}' xmlns='{}' xmlns:stream='{}' version='1.0'>",
            xml_escape(domain),
            ns::JABBER_CLIENT,
            ns::STREAM,
        );
        self.write_raw(&header).await
    }

    /// Ask the peer to upgrade the transport to TLS.
    pub async fn write_starttls(&mut self) -> Result<(), Error> {
        self.write_raw(&format!("<starttls xmlns='{}'/>", ns::TLS)).await
    }

    /// Start SASL with `mechanism`, optionally carrying a base64 initial
    /// response.
    pub async fn write_auth(&mut self, mechanism: &str, initial: Option<&str>) -> Result<(), Error> {
        let fragment = match initial {
            Some(data) => format!(
                "<auth xmlns='{}' mechanism='{}'>{}</auth>",
                ns::SASL,
                mechanism,
                data
            ),
            None => format!("<auth xmlns='{}' mechanism='{}'/>\n", ns::SASL, mechanism),
        };
        self.write_raw(&fragment).await
    }

    /// Answer a SASL challenge with a base64 payload.
    pub async fn write_sasl_response(&mut self, data: &str) -> Result<(), Error> {
        self.write_raw(&format!("<response xmlns='{}'>{}</response>\n", ns::SASL, data))
            .await
    }

    /// Serialize and send one stanza.
    pub async fn write_stanza(&mut self, stanza: &Stanza) -> Result<(), Error> {
        self.write_raw(&stanza.to_xml()).await
    }

    /// Send `</stream:stream>` and shut the write direction down.
    pub async fn close(&mut self) -> Result<(), Error> {
        self.write_raw("</stream:stream>").await?;
        self.inner.shutdown().await?;
        Ok(())
    }
}

/// Read and write sides of one XML stream over a boxed transport.
///
/// Single-reader, single-writer: after login, [`Codec::split`] hands the
/// halves to the reader task and the send path respectively.
pub struct Codec {
    reader: StanzaReader<ReadHalf<Transport>>,
    writer: StanzaWriter<WriteHalf<Transport>>,
}

impl Codec {
    /// Attach a codec to a freshly dialed (or freshly TLS-wrapped)
    /// transport.
    pub fn new(transport: Transport) -> Codec {
        let (reader, writer) = tokio::io::split(transport);
        Codec {
            reader: StanzaReader::new(reader),
            writer: StanzaWriter::new(writer),
        }
    }

    /// Drop parser state after `<success/>`; the transport and any bytes
    /// it already buffered are kept.
    pub fn reset(self) -> Codec {
        Codec {
            reader: self.reader.reset(),
            writer: self.writer,
        }
    }

    /// Reunite the halves and recover the transport for a TLS upgrade.
    ///
    /// Any parser-buffered bytes are dropped; the callers only do this
    /// right after `<proceed/>`, when the server is waiting for our TLS
    /// hello and the read buffer is empty.
    pub fn into_inner(self) -> Transport {
        self.reader.into_inner().unsplit(self.writer.into_inner())
    }

    /// Split into independently owned read and write sides.
    pub fn split(
        self,
    ) -> (
        StanzaReader<ReadHalf<Transport>>,
        StanzaWriter<WriteHalf<Transport>>,
    ) {
        (self.reader, self.writer)
    }

    /// See [`StanzaReader::read_stream_header`].
    pub async fn read_stream_header(&mut self) -> Result<(), Error> {
        self.reader.read_stream_header().await
    }

    /// See [`StanzaReader::next_stanza`].
    pub async fn next_stanza(&mut self) -> Result<Stanza, Error> {
        self.reader.next_stanza().await
    }

    /// See [`StanzaWriter::write_stream_header`].
    pub async fn write_stream_header(&mut self, domain: &str) -> Result<(), Error> {
        self.writer.write_stream_header(domain).await
    }

    /// See [`StanzaWriter::write_starttls`].
    pub async fn write_starttls(&mut self) -> Result<(), Error> {
        self.writer.write_starttls().await
    }

    /// See [`StanzaWriter::write_auth`].
    pub async fn write_auth(&mut self, mechanism: &str, initial: Option<&str>) -> Result<(), Error> {
        self.writer.write_auth(mechanism, initial).await
    }

    /// See [`StanzaWriter::write_sasl_response`].
    pub async fn write_sasl_response(&mut self, data: &str) -> Result<(), Error> {
        self.writer.write_sasl_response(data).await
    }

    /// See [`StanzaWriter::write_raw`].
    pub async fn write_raw(&mut self, fragment: &str) -> Result<(), Error> {
        self.writer.write_raw(fragment).await
    }
}
