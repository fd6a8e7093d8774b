use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use super::*;
use crate::auth;
use crate::connect::StartTlsError;
use crate::error::{AuthError, ProtocolError};
use crate::stanza::PresenceType;

const SERVER_HEADER: &str = "<?xml version='1.0'?><stream:stream \
     xmlns='jabber:client' xmlns:stream='http://etherx.jabber.org/streams' \
     id='srv' from='example.com' version='1.0'>";

const BIND_SESSION_FEATURES: &str = "<stream:features>\
     <bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'/>\
     <session xmlns='urn:ietf:params:xml:ns:xmpp-session'/>\
     </stream:features>";

/// Scripted side of a mock server: a socket plus a running transcript of
/// everything the client has sent.
struct Script {
    sock: TcpStream,
    buf: String,
    pos: usize,
}

impl Script {
    fn new(sock: TcpStream) -> Script {
        Script {
            sock,
            buf: String::new(),
            pos: 0,
        }
    }

    /// Consume client bytes up to and including `pattern`; panics if the
    /// client hangs up first.
    async fn read_until(&mut self, pattern: &str) -> String {
        match self.try_read_until(pattern).await {
            Some(segment) => segment,
            None => panic!(
                "client closed while server waited for {:?}; pending: {:?}",
                pattern,
                &self.buf[self.pos..]
            ),
        }
    }

    /// Like `read_until`, but `None` once the client hangs up.
    async fn try_read_until(&mut self, pattern: &str) -> Option<String> {
        loop {
            if let Some(i) = self.buf[self.pos..].find(pattern) {
                let end = self.pos + i + pattern.len();
                let segment = self.buf[self.pos..end].to_owned();
                self.pos = end;
                return Some(segment);
            }
            let mut chunk = [0u8; 4096];
            let n = timeout(Duration::from_secs(5), self.sock.read(&mut chunk))
                .await
                .expect("timed out waiting for client data")
                .unwrap();
            if n == 0 {
                return None;
            }
            self.buf.push_str(std::str::from_utf8(&chunk[..n]).unwrap());
        }
    }

    async fn send(&mut self, data: &str) {
        self.sock.write_all(data.as_bytes()).await.unwrap();
    }
}

fn attr_value(fragment: &str, name: &str) -> String {
    let marker = format!("{}='", name);
    let start = fragment.find(&marker).expect("attribute missing") + marker.len();
    let end = fragment[start..].find('\'').expect("attribute unterminated") + start;
    fragment[start..end].to_owned()
}

/// Value of a `key=value` or `key="value"` directive inside a decoded
/// DIGEST-MD5 response message.
fn directive(message: &str, key: &str) -> String {
    let marker = format!("{}=", key);
    let start = message.find(&marker).expect("directive missing") + marker.len();
    let rest = &message[start..];
    if let Some(quoted) = rest.strip_prefix('"') {
        quoted[..quoted.find('"').unwrap()].to_owned()
    } else {
        rest.split(',').next().unwrap().trim().to_owned()
    }
}

async fn bind_listener() -> (TcpListener, String) {
    let _ = env_logger::builder().is_test(true).try_init();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host = listener.local_addr().unwrap().to_string();
    (listener, host)
}

fn quiet_client() -> Client {
    Client::new(ClientConfig {
        ping_enabled: false,
        reconnect_enabled: false,
        ..ClientConfig::default()
    })
}

/// Serve the client's stream open and advertise SASL mechanisms plus
/// bind+session.
async fn serve_stream_open(s: &mut Script, mechanisms: &str) {
    let header = s.read_until("version='1.0'>").await;
    assert!(header.contains("<stream:stream"), "header: {}", header);
    assert!(header.contains("to='example.com'"), "header: {}", header);
    s.send(SERVER_HEADER).await;
    s.send(&format!(
        "<stream:features>\
         <mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>{}</mechanisms>\
         <bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'/>\
         <session xmlns='urn:ietf:params:xml:ns:xmpp-session'/>\
         </stream:features>",
        mechanisms
    ))
    .await;
}

/// Serve the post-auth restart, resource bind and session from a scripted
/// server.
async fn serve_bind_session(s: &mut Script, jid: &str) {
    let restart = s.read_until("version='1.0'>").await;
    assert!(restart.contains("<stream:stream"), "restart: {}", restart);
    assert!(restart.contains("to='example.com'"), "restart: {}", restart);
    s.send(SERVER_HEADER).await;
    s.send(BIND_SESSION_FEATURES).await;

    let bind = s.read_until("</iq>").await;
    assert!(bind.contains("<bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'/>"));
    s.send(&format!(
        "<iq type='result' id='x'>\
         <bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'><jid>{}</jid></bind>\
         </iq>",
        jid
    ))
    .await;

    let session = s.read_until("</iq>").await;
    assert!(session.contains("<session xmlns='urn:ietf:params:xml:ns:xmpp-session'/>"));
    s.send("<iq type='result' id='x'/>").await;
}

/// Full PLAIN login for user@example.com / pass.
async fn serve_plain_login(s: &mut Script) {
    serve_stream_open(s, "<mechanism>PLAIN</mechanism>").await;
    let auth = s.read_until("</auth>").await;
    assert_eq!(
        auth,
        "<auth xmlns='urn:ietf:params:xml:ns:xmpp-sasl' mechanism='PLAIN'>AHVzZXIAcGFzcw==</auth>"
    );
    s.send("<success xmlns='urn:ietf:params:xml:ns:xmpp-sasl'/>").await;
    serve_bind_session(s, "user@example.com/balcony").await;
}

#[tokio::test]
async fn plain_login_reaches_ready_with_bound_jid() {
    let (listener, host) = bind_listener().await;
    let server = tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let mut s = Script::new(sock);
        serve_plain_login(&mut s).await;
    });

    let client = quiet_client();
    client.connect(&host, "user@example.com", "pass").await.unwrap();

    assert!(client.is_connected());
    assert_eq!(client.bound_jid().as_deref(), Some("user@example.com/balcony"));
    server.await.unwrap();
    client.disconnect().await.unwrap();
    assert!(!client.is_connected());
}

#[tokio::test]
async fn digest_md5_login_computes_valid_response() {
    let (listener, host) = bind_listener().await;
    let server = tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let mut s = Script::new(sock);
        serve_stream_open(&mut s, "<mechanism>DIGEST-MD5</mechanism><mechanism>PLAIN</mechanism>")
            .await;

        // DIGEST-MD5 must win over PLAIN and start with an empty <auth/>
        s.read_until("mechanism='DIGEST-MD5'/>").await;
        let challenge = BASE64.encode(
            "realm=\"example.com\",nonce=\"OA6MG9tEQGm2hh\",\
             qop=\"auth\",charset=utf-8,algorithm=md5-sess",
        );
        s.send(&format!(
            "<challenge xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>{}</challenge>",
            challenge
        ))
        .await;

        let response = s.read_until("</response>").await;
        let payload_start = response.find('>').unwrap() + 1;
        let payload = &response[payload_start..response.find("</response>").unwrap()];
        let message = String::from_utf8(BASE64.decode(payload).unwrap()).unwrap();

        assert_eq!(directive(&message, "username"), "user");
        assert_eq!(directive(&message, "realm"), "example.com");
        assert_eq!(directive(&message, "nonce"), "OA6MG9tEQGm2hh");
        assert_eq!(directive(&message, "digest-uri"), "xmpp/example.com");
        assert_eq!(directive(&message, "nc"), "00000001");
        assert_eq!(directive(&message, "qop"), "auth");
        assert_eq!(directive(&message, "charset"), "utf-8");

        let cnonce = directive(&message, "cnonce");
        assert_eq!(cnonce.len(), 16);
        let expected = auth::md5_digest_response(
            "user",
            "example.com",
            "pass",
            "OA6MG9tEQGm2hh",
            &cnonce,
            "AUTHENTICATE",
            "xmpp/example.com",
            "00000001",
        );
        assert_eq!(directive(&message, "response"), expected);

        s.send("<success xmlns='urn:ietf:params:xml:ns:xmpp-sasl'/>").await;
        serve_bind_session(&mut s, "user@example.com/digest").await;
    });

    let client = quiet_client();
    client.connect(&host, "user@example.com", "pass").await.unwrap();
    assert_eq!(client.bound_jid().as_deref(), Some("user@example.com/digest"));
    server.await.unwrap();
}

#[tokio::test]
async fn unsupported_mechanisms_fail_typed() {
    let (listener, host) = bind_listener().await;
    tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let mut s = Script::new(sock);
        serve_stream_open(&mut s, "<mechanism>SCRAM-SHA-1</mechanism>").await;
        // client gives up here
        let _ = s.try_read_until("never").await;
    });

    let client = quiet_client();
    match client.connect(&host, "user@example.com", "pass").await {
        Err(Error::Auth(AuthError::Unsupported(mechanisms))) => {
            assert_eq!(mechanisms, vec!["SCRAM-SHA-1".to_owned()]);
        }
        other => panic!("unexpected result: {:?}", other.err()),
    }
    assert!(!client.is_connected());
}

#[tokio::test]
async fn auth_failure_carries_condition() {
    let (listener, host) = bind_listener().await;
    tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let mut s = Script::new(sock);
        serve_stream_open(&mut s, "<mechanism>PLAIN</mechanism>").await;
        s.read_until("</auth>").await;
        s.send(
            "<failure xmlns='urn:ietf:params:xml:ns:xmpp-sasl'><not-authorized/></failure>",
        )
        .await;
    });

    let client = quiet_client();
    match client.connect(&host, "user@example.com", "wrong").await {
        Err(Error::Auth(AuthError::Fail(condition))) => assert_eq!(condition, "not-authorized"),
        other => panic!("unexpected result: {:?}", other.err()),
    }
}

#[tokio::test]
async fn starttls_refusal_is_a_tls_error() {
    let (listener, host) = bind_listener().await;
    tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let mut s = Script::new(sock);
        s.read_until("version='1.0'>").await;
        s.send(SERVER_HEADER).await;
        s.send(
            "<stream:features>\
             <starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'><required/></starttls>\
             <mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'><mechanism>PLAIN</mechanism></mechanisms>\
             </stream:features>",
        )
        .await;
        s.read_until("<starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'/>").await;
        s.send("<failure xmlns='urn:ietf:params:xml:ns:xmpp-tls'/>").await;
    });

    let client = quiet_client();
    match client.connect(&host, "user@example.com", "pass").await {
        Err(Error::Tls(StartTlsError::Refused)) => {}
        other => panic!("unexpected result: {:?}", other.err()),
    }
}

#[tokio::test]
async fn bind_error_fails_typed() {
    let (listener, host) = bind_listener().await;
    tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let mut s = Script::new(sock);
        serve_stream_open(&mut s, "<mechanism>PLAIN</mechanism>").await;
        s.read_until("</auth>").await;
        s.send("<success xmlns='urn:ietf:params:xml:ns:xmpp-sasl'/>").await;
        s.read_until("version='1.0'>").await;
        s.send(SERVER_HEADER).await;
        s.send(BIND_SESSION_FEATURES).await;
        s.read_until("</iq>").await;
        s.send("<iq type='error' id='x'/>").await;
    });

    let client = quiet_client();
    match client.connect(&host, "user@example.com", "pass").await {
        Err(Error::Protocol(ProtocolError::BindFailed)) => {}
        other => panic!("unexpected result: {:?}", other.err()),
    }
}

#[tokio::test]
async fn session_error_fails_typed() {
    let (listener, host) = bind_listener().await;
    tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let mut s = Script::new(sock);
        serve_stream_open(&mut s, "<mechanism>PLAIN</mechanism>").await;
        s.read_until("</auth>").await;
        s.send("<success xmlns='urn:ietf:params:xml:ns:xmpp-sasl'/>").await;
        s.read_until("version='1.0'>").await;
        s.send(SERVER_HEADER).await;
        s.send(BIND_SESSION_FEATURES).await;
        s.read_until("</iq>").await;
        s.send(
            "<iq type='result' id='x'>\
             <bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'><jid>u@example.com/r</jid></bind>\
             </iq>",
        )
        .await;
        s.read_until("</iq>").await;
        s.send("<iq type='error' id='x'/>").await;
    });

    let client = quiet_client();
    match client.connect(&host, "user@example.com", "pass").await {
        Err(Error::Protocol(ProtocolError::SessionFailed)) => {}
        other => panic!("unexpected result: {:?}", other.err()),
    }
}

#[tokio::test]
async fn subscribe_push_reaches_handler_and_chat_echoes() {
    let (listener, host) = bind_listener().await;
    let server = tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let mut s = Script::new(sock);
        serve_plain_login(&mut s).await;

        s.send("<presence from='a@x' type='subscribe'/>").await;
        let reply = s.read_until("type='subscribed'/>").await;
        assert!(reply.contains("<presence to='a@x'"));

        s.send(
            "<message from='friend@x/home' type='chat'><body>ping me</body></message>",
        )
        .await;
        let echo = s.read_until("</message>").await;
        assert!(echo.contains("to='friend@x/home'"));
        assert!(echo.contains("<body>echo ping me</body>"));
    });

    let client = quiet_client();
    let (subscribe, mut subscriptions) = Handler::subscribe();
    client.add_handler(subscribe);
    let (chat, mut chats) = Handler::chat();
    client.add_handler(chat);

    client.connect(&host, "user@example.com", "pass").await.unwrap();

    let event = subscriptions
        .await_event(Duration::from_secs(1))
        .await
        .expect("subscribe presence not delivered");
    let presence = match event.into_stanza() {
        Some(Stanza::Presence(presence)) => presence,
        other => panic!("unexpected event payload: {:?}", other),
    };
    assert_eq!(presence.type_, PresenceType::Subscribe);
    let from = presence.from.unwrap();
    client.send(Presence::to(from, PresenceType::Subscribed)).await.unwrap();

    let event = chats
        .await_event(Duration::from_secs(1))
        .await
        .expect("chat message not delivered");
    let message = match event.into_stanza() {
        Some(Stanza::Message(message)) => message,
        other => panic!("unexpected event payload: {:?}", other),
    };
    let body = message.body.unwrap();
    client
        .send_chat(message.from.as_deref().unwrap(), &format!("echo {}", body))
        .await
        .unwrap();

    server.await.unwrap();
}

#[tokio::test]
async fn roster_request_round_trips() {
    let (listener, host) = bind_listener().await;
    let server = tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let mut s = Script::new(sock);
        serve_plain_login(&mut s).await;

        let request = s.read_until("</iq>").await;
        assert!(request.contains("<query xmlns='jabber:iq:roster'/>"));
        let id = attr_value(&request, "id");
        s.send(&format!(
            "<iq type='result' id='{}'>\
             <query xmlns='jabber:iq:roster'>\
             <item jid='bob@example.com' name='Bob' subscription='both'/>\
             <item jid='eve@example.com' subscription='none'/>\
             </query></iq>",
            id
        ))
        .await;
    });

    let client = quiet_client();
    client.connect(&host, "user@example.com", "pass").await.unwrap();

    let roster = client.request_roster().await.unwrap();
    assert_eq!(roster.items.len(), 2);
    assert_eq!(roster.items[0].jid, "bob@example.com");
    assert_eq!(roster.items[0].name.as_deref(), Some("Bob"));
    server.await.unwrap();
}

#[tokio::test]
async fn roster_error_reply_is_no_roster_response() {
    let (listener, host) = bind_listener().await;
    tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let mut s = Script::new(sock);
        serve_plain_login(&mut s).await;

        let request = s.read_until("</iq>").await;
        let id = attr_value(&request, "id");
        s.send(&format!("<iq type='error' id='{}'/>", id)).await;
        let _ = s.try_read_until("never").await;
    });

    let client = quiet_client();
    client.connect(&host, "user@example.com", "pass").await.unwrap();
    assert!(matches!(
        client.request_roster().await,
        Err(Error::NoRosterResponse)
    ));
}

#[tokio::test]
async fn second_connect_is_already_connected() {
    let (listener, host) = bind_listener().await;
    tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let mut s = Script::new(sock);
        serve_plain_login(&mut s).await;
        let _ = s.try_read_until("never").await;
    });

    let client = quiet_client();
    client.connect(&host, "user@example.com", "pass").await.unwrap();
    assert!(matches!(
        client.connect(&host, "user@example.com", "pass").await,
        Err(Error::AlreadyConnected)
    ));
}

#[tokio::test]
async fn send_without_connection_is_not_connected() {
    let client = quiet_client();
    assert!(matches!(
        client.send_chat("a@b", "hi").await,
        Err(Error::NotConnected)
    ));
}

#[tokio::test]
async fn answered_pings_keep_the_connection_alive() {
    let (listener, host) = bind_listener().await;
    let server = tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let mut s = Script::new(sock);
        serve_plain_login(&mut s).await;

        let mut answered = 0u32;
        while let Some(iq) = s.try_read_until("</iq>").await {
            if iq.contains("urn:xmpp:ping") {
                let id = attr_value(&iq, "id");
                s.send(&format!("<iq type='result' id='{}'/>", id)).await;
                answered += 1;
            }
        }
        answered
    });

    let client = Client::new(ClientConfig {
        ping_enabled: true,
        ping_error_threshold: 2,
        ping_interval: Duration::from_millis(50),
        reconnect_enabled: false,
        reconnect_max_attempts: 0,
    });
    client.connect(&host, "user@example.com", "pass").await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(client.is_connected(), "answered pings must keep the session up");
    client.disconnect().await.unwrap();

    let answered = server.await.unwrap();
    assert!(answered >= 2, "expected at least two answered pings, got {}", answered);
}

#[tokio::test]
async fn successful_reconnect_reissues_roster_and_presence() {
    let (listener, host) = bind_listener().await;
    let server = tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let mut s = Script::new(sock);
        serve_plain_login(&mut s).await;
        // Starve the pings until the client tears this connection down.
        while s.try_read_until("</iq>").await.is_some() {}

        let (sock, _) = listener.accept().await.unwrap();
        let mut s = Script::new(sock);
        serve_plain_login(&mut s).await;

        let roster = s.read_until("</iq>").await;
        assert!(roster.contains("<query xmlns='jabber:iq:roster'/>"));
        let id = attr_value(&roster, "id");
        s.send(&format!(
            "<iq type='result' id='{}'><query xmlns='jabber:iq:roster'/></iq>",
            id
        ))
        .await;
        s.read_until("<presence/>").await;
    });

    let client = Client::new(ClientConfig {
        ping_enabled: true,
        ping_error_threshold: 1,
        ping_interval: Duration::from_millis(100),
        reconnect_enabled: true,
        reconnect_max_attempts: 3,
    });
    client.connect(&host, "user@example.com", "pass").await.unwrap();

    timeout(Duration::from_secs(10), server)
        .await
        .expect("reconnect flow timed out")
        .unwrap();
    assert!(client.is_connected());
    assert_eq!(client.reconnect_attempts(), 0, "counter resets on success");
}

#[tokio::test]
async fn ping_starvation_reconnects_up_to_the_bound_then_reports() {
    let (listener, host) = bind_listener().await;
    let server = tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        // No more accepts: every reconnect attempt is refused.
        drop(listener);

        let mut s = Script::new(sock);
        serve_plain_login(&mut s).await;

        // Swallow everything without ever answering.
        let mut pings = 0u32;
        while let Some(iq) = s.try_read_until("</iq>").await {
            if iq.contains("urn:xmpp:ping") {
                pings += 1;
            }
        }
        pings
    });

    let client = Client::new(ClientConfig {
        ping_enabled: true,
        ping_error_threshold: 2,
        ping_interval: Duration::from_millis(100),
        reconnect_enabled: true,
        reconnect_max_attempts: 3,
    });
    let (errors, mut error_events) = Handler::connection_error();
    client.add_handler(errors);

    client.connect(&host, "user@example.com", "pass").await.unwrap();

    let event = error_events
        .await_event(Duration::from_secs(10))
        .await
        .expect("reconnect exhaustion must fire a connection error");
    match event {
        Event::ConnectionError { message, .. } => {
            assert_eq!(
                message,
                "Ping timeout and reconnect failed after retrying 3 times"
            );
        }
        other => panic!("unexpected event: {:?}", other),
    }

    assert_eq!(client.reconnect_attempts(), 3);
    assert!(!client.is_connected());

    let pings = server.await.unwrap();
    assert!(pings >= 2, "expected at least two pings before giving up, got {}", pings);
}
