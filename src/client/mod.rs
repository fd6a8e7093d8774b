//! XMPP client supervisor: owns the connection, the reader and pinger
//! tasks, the handler registry, and the reconnection policy.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use log::debug;
use tokio::io::ReadHalf;
use tokio::sync::{watch, Mutex};

use crate::codec::{StanzaReader, StanzaWriter};
use crate::connect::{self, dns, Transport};
use crate::error::Error;
use crate::event::Event;
use crate::handler::{Handler, HandlerId, HandlerRegistry};
use crate::jid;
use crate::stanza::{Iq, IqPayload, IqType, Message, Presence, Roster, Stanza};
use crate::util::random_token;

mod login;
#[cfg(test)]
mod tests;

// Timings are compressed under cfg(test) so the supervisor tests finish in
// well under a second of wall clock per scenario.
#[cfg(not(test))]
const PING_TIMEOUT: Duration = Duration::from_secs(5);
#[cfg(test)]
const PING_TIMEOUT: Duration = Duration::from_millis(300);

#[cfg(not(test))]
const RECONNECT_BACKOFF_UNIT: Duration = Duration::from_secs(5);
#[cfg(test)]
const RECONNECT_BACKOFF_UNIT: Duration = Duration::from_millis(50);

#[cfg(not(test))]
const ROSTER_TIMEOUT: Duration = Duration::from_secs(10);
#[cfg(test)]
const ROSTER_TIMEOUT: Duration = Duration::from_millis(500);

/// Tunables for one client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Probe liveness with XEP-0199 pings
    pub ping_enabled: bool,
    /// Consecutive ping failures before the connection is declared dead
    pub ping_error_threshold: u32,
    /// Delay between pings
    pub ping_interval: Duration,
    /// Reconnect automatically once the connection is declared dead
    pub reconnect_enabled: bool,
    /// How many reconnect attempts to make before giving up
    pub reconnect_max_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> ClientConfig {
        ClientConfig {
            ping_enabled: true,
            ping_error_threshold: 3,
            ping_interval: Duration::from_secs(30),
            reconnect_enabled: true,
            reconnect_max_attempts: 5,
        }
    }
}

/// One attached transport with its codec halves and liveness state.
///
/// Recreated on every (re)connect, never shared across attempts. The
/// bound JID is assigned at construction and never changes.
struct Connection {
    writer: Mutex<StanzaWriter<tokio::io::WriteHalf<Transport>>>,
    bound_jid: Option<String>,
    domain: String,
    live: AtomicBool,
    stop: watch::Sender<bool>,
}

#[derive(Clone)]
struct SessionParams {
    host: String,
    jid: String,
    password: String,
}

struct ClientInner {
    config: ClientConfig,
    handlers: HandlerRegistry,
    connection: StdMutex<Option<Arc<Connection>>>,
    session: StdMutex<Option<SessionParams>>,
    reconnect_attempts: AtomicU32,
}

/// An XMPP client. Cheap to clone; clones share the connection and the
/// handler registry.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// A disconnected client with the given configuration.
    pub fn new(config: ClientConfig) -> Client {
        Client {
            inner: Arc::new(ClientInner {
                config,
                handlers: HandlerRegistry::new(),
                connection: StdMutex::new(None),
                session: StdMutex::new(None),
                reconnect_attempts: AtomicU32::new(0),
            }),
        }
    }

    /// Connect and log in.
    ///
    /// With a blank `host` the server is discovered through the SRV record
    /// of the JID's domain; otherwise `host` is used as `host[:port]`,
    /// defaulting the port to 5222. Handshake failures are returned from
    /// here; faults after that surface as [`Event::ConnectionError`]
    /// through the handler registry.
    pub async fn connect(&self, host: &str, jid: &str, password: &str) -> Result<(), Error> {
        connect_client(&self.inner, host, jid, password).await
    }

    /// Close the connection: stops the pinger, unblocks the reader and
    /// shuts the stream down. Harmless when already disconnected.
    pub async fn disconnect(&self) -> Result<(), Error> {
        disconnect_client(&self.inner).await
    }

    /// Send one stanza over the live connection.
    pub async fn send(&self, stanza: impl Into<Stanza>) -> Result<(), Error> {
        send_stanza(&self.inner, stanza.into()).await
    }

    /// Send a chat message to `to`.
    pub async fn send_chat(&self, to: &str, body: &str) -> Result<(), Error> {
        self.send(Message::chat(to, body)).await
    }

    /// Broadcast available presence with a status line.
    pub async fn send_presence_status(&self, status: &str) -> Result<(), Error> {
        self.send(Presence::status(status)).await
    }

    /// Fetch the contact list. Waits for the matching `result` IQ;
    /// anything else within the deadline, or silence, is
    /// [`Error::NoRosterResponse`].
    pub async fn request_roster(&self) -> Result<Roster, Error> {
        request_roster(&self.inner).await
    }

    /// Register a handler; it stays registered across reconnects.
    pub fn add_handler(&self, handler: Handler) -> HandlerId {
        self.inner.handlers.add(handler)
    }

    /// Drop a handler by its handle.
    pub fn remove_handler(&self, id: HandlerId) -> bool {
        self.inner.handlers.remove(id)
    }

    /// The JID the server bound this session to, while connected.
    pub fn bound_jid(&self) -> Option<String> {
        current_connection(&self.inner).and_then(|connection| connection.bound_jid.clone())
    }

    /// Is there a live connection right now?
    pub fn is_connected(&self) -> bool {
        current_connection(&self.inner).is_some()
    }

    #[cfg(test)]
    pub(crate) fn reconnect_attempts(&self) -> u32 {
        self.inner.reconnect_attempts.load(Ordering::SeqCst)
    }
}

fn current_connection(inner: &ClientInner) -> Option<Arc<Connection>> {
    inner
        .connection
        .lock()
        .expect("connection state poisoned")
        .as_ref()
        .filter(|connection| connection.live.load(Ordering::SeqCst))
        .cloned()
}

/// Boxes the future explicitly so the connect/ping-loop/reconnect cycle
/// (connect_client spawns ping_loop, which on failure calls back into
/// connect_client) doesn't leave rustc trying to resolve a self-referential
/// opaque `impl Future` type for its `Send`-ness.
fn connect_client<'a>(
    inner: &'a Arc<ClientInner>,
    host: &'a str,
    jid: &'a str,
    password: &'a str,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), Error>> + Send + 'a>> {
    Box::pin(connect_client_inner(inner, host, jid, password))
}

async fn connect_client_inner(
    inner: &Arc<ClientInner>,
    host: &str,
    jid: &str,
    password: &str,
) -> Result<(), Error> {
    if current_connection(inner).is_some() {
        return Err(Error::AlreadyConnected);
    }

    let (username, domain) = jid::parts(jid)?;
    let host = if host.trim().is_empty() {
        let (resolved_host, port) = dns::resolve(domain).await?;
        format!("{}:{}", resolved_host, port)
    } else {
        connect::with_default_port(host)
    };

    let tcp = connect::dial(&host).await?;
    let negotiated = login::login(Box::new(tcp), username, domain, password).await?;

    let (reader, writer) = negotiated.codec.split();
    let (stop, stop_rx) = watch::channel(false);
    let connection = Arc::new(Connection {
        writer: Mutex::new(writer),
        bound_jid: negotiated.bound_jid,
        domain: domain.to_owned(),
        live: AtomicBool::new(true),
        stop,
    });

    *inner.connection.lock().expect("connection state poisoned") = Some(Arc::clone(&connection));
    *inner.session.lock().expect("session state poisoned") = Some(SessionParams {
        host,
        jid: jid.to_owned(),
        password: password.to_owned(),
    });
    inner.reconnect_attempts.store(0, Ordering::SeqCst);

    tokio::spawn(read_loop(
        Arc::clone(inner),
        Arc::clone(&connection),
        reader,
        stop_rx.clone(),
    ));
    if inner.config.ping_enabled {
        tokio::spawn(ping_loop(Arc::clone(inner), Arc::clone(&connection), stop_rx));
    }
    Ok(())
}

async fn disconnect_client(inner: &Arc<ClientInner>) -> Result<(), Error> {
    let connection = inner
        .connection
        .lock()
        .expect("connection state poisoned")
        .take();
    let Some(connection) = connection else {
        return Ok(());
    };

    connection.live.store(false, Ordering::SeqCst);
    let _ = connection.stop.send(true);

    // Write errors on an already-broken transport are of no interest to
    // anyone at this point.
    let mut writer = connection.writer.lock().await;
    let _ = writer.close().await;
    Ok(())
}

async fn send_stanza(inner: &Arc<ClientInner>, stanza: Stanza) -> Result<(), Error> {
    let Some(connection) = current_connection(inner) else {
        return Err(Error::NotConnected);
    };
    send_on(&connection, &stanza).await
}

async fn send_on(connection: &Connection, stanza: &Stanza) -> Result<(), Error> {
    if !connection.live.load(Ordering::SeqCst) {
        return Err(Error::NotConnected);
    }
    let mut writer = connection.writer.lock().await;
    writer.write_stanza(stanza).await
}

async fn read_loop(
    inner: Arc<ClientInner>,
    connection: Arc<Connection>,
    mut reader: StanzaReader<ReadHalf<Transport>>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            result = reader.next_stanza() => match result {
                Ok(stanza) => inner.handlers.fire(&Event::Stanza(stanza)),
                Err(error) => {
                    // a read failing because we closed locally is not news
                    if connection.live.load(Ordering::SeqCst) {
                        inner.handlers.fire(&Event::ConnectionError {
                            error: Arc::new(error),
                            message: "receive stanza error".to_owned(),
                        });
                    }
                    break;
                }
            },
        }
    }
    debug!("reader stopped");
}

async fn ping_loop(
    inner: Arc<ClientInner>,
    connection: Arc<Connection>,
    mut stop: watch::Receiver<bool>,
) {
    let mut error_count = 0u32;
    loop {
        tokio::select! {
            _ = stop.changed() => return,
            _ = tokio::time::sleep(inner.config.ping_interval) => {}
        }
        match ping_once(&inner, &connection).await {
            Ok(()) => error_count = 0,
            Err(error) => {
                if !connection.live.load(Ordering::SeqCst) {
                    // lost the race against a local disconnect
                    return;
                }
                error_count += 1;
                debug!(
                    "ping failed ({}/{}): {}",
                    error_count, inner.config.ping_error_threshold, error
                );
                if error_count >= inner.config.ping_error_threshold {
                    handle_ping_error(&inner, error).await;
                    return;
                }
            }
        }
    }
}

/// One ping round trip: fresh id, one-shot handler keyed on it, bounded
/// wait. A `result` and an unsupported-ping `error` IQ both count as
/// liveness.
async fn ping_once(inner: &Arc<ClientInner>, connection: &Arc<Connection>) -> Result<(), Error> {
    let id = random_token(10);
    let (handler, mut events) = Handler::iq_id(&id);
    let handler_id = inner.handlers.add(handler);

    let ping = Iq {
        id,
        to: Some(connection.domain.clone()),
        type_: IqType::Get,
        payload: Some(IqPayload::Ping),
        ..Iq::default()
    };
    if let Err(error) = send_on(connection, &Stanza::Iq(ping)).await {
        inner.handlers.remove(handler_id);
        return Err(error);
    }

    match events.await_event(PING_TIMEOUT).await {
        Some(_) => Ok(()),
        None => {
            inner.handlers.remove(handler_id);
            Err(Error::PingTimeout)
        }
    }
}

/// The connection is dead: tear it down and, when configured, try to get a
/// new one up with increasing backoff. After a successful reconnect the
/// roster request and initial presence are re-issued so server pushes
/// resume.
async fn handle_ping_error(inner: &Arc<ClientInner>, error: Error) {
    let _ = disconnect_client(inner).await;

    if !inner.config.reconnect_enabled {
        inner.handlers.fire(&Event::ConnectionError {
            error: Arc::new(error),
            message: "Ping timeout!".to_owned(),
        });
        return;
    }

    let params = inner.session.lock().expect("session state poisoned").clone();
    let Some(params) = params else {
        return;
    };

    let max_attempts = inner.config.reconnect_max_attempts;
    let mut reconnected = false;
    while inner.reconnect_attempts.load(Ordering::SeqCst) < max_attempts {
        let attempt = inner.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let backoff = RECONNECT_BACKOFF_UNIT * attempt;
        debug!("reconnect attempt {} of {} after {:?}", attempt, max_attempts, backoff);
        tokio::time::sleep(backoff).await;
        match connect_client(inner, &params.host, &params.jid, &params.password).await {
            Ok(()) => {
                debug!("reconnected");
                reconnected = true;
                break;
            }
            Err(connect_error) => debug!("reconnect failed: {}", connect_error),
        }
    }

    if !reconnected {
        let message = format!(
            "Ping timeout and reconnect failed after retrying {} times",
            max_attempts
        );
        inner.handlers.fire(&Event::ConnectionError {
            error: Arc::new(error),
            message,
        });
        return;
    }

    let _ = request_roster(inner).await;
    let _ = send_stanza(inner, Presence::default().into()).await;
}

async fn request_roster(inner: &Arc<ClientInner>) -> Result<Roster, Error> {
    let id = random_token(10);
    let (handler, mut events) = Handler::iq_id(&id);
    let handler_id = inner.handlers.add(handler);

    let request = Iq::get(id, IqPayload::Roster(Roster::default()));
    if let Err(error) = send_stanza(inner, request.into()).await {
        inner.handlers.remove(handler_id);
        return Err(error);
    }

    match events.await_event(ROSTER_TIMEOUT).await {
        Some(Event::Stanza(Stanza::Iq(iq))) if iq.type_ == IqType::Result => match iq.payload {
            Some(IqPayload::Roster(roster)) => Ok(roster),
            _ => Ok(Roster::default()),
        },
        Some(_) => Err(Error::NoRosterResponse),
        None => {
            inner.handlers.remove(handler_id);
            Err(Error::NoRosterResponse)
        }
    }
}
