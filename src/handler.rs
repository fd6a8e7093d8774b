//! Event handlers: a filter deciding which events a subscriber cares
//! about, a channel the matching events are delivered on, and a registry
//! dispatching into the current handler set.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::event::Event;
use crate::stanza::{MessageType, PresenceType, Stanza};

/// Opaque handle identifying a registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Filter = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// A filter plus the sending side of the subscriber's event channel.
///
/// Constructors return the matching [`EventReceiver`] alongside; register
/// the handler with the client and consume events from the receiver.
pub struct Handler {
    filter: Filter,
    one_shot: bool,
    tx: mpsc::UnboundedSender<Event>,
}

impl Handler {
    /// Handler with an arbitrary filter. `one_shot` handlers are removed
    /// from the registry right after their first delivery.
    pub fn new(
        one_shot: bool,
        filter: impl Fn(&Event) -> bool + Send + Sync + 'static,
    ) -> (Handler, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Handler {
                filter: Arc::new(filter),
                one_shot,
                tx,
            },
            EventReceiver { rx },
        )
    }

    /// Incoming chat messages with a non-empty body.
    pub fn chat() -> (Handler, EventReceiver) {
        Handler::new(false, |event| match event.as_stanza() {
            Some(Stanza::Message(message)) => {
                message.type_ == MessageType::Chat
                    && message.body.as_deref().is_some_and(|body| !body.is_empty())
            }
            _ => false,
        })
    }

    /// Incoming presence subscription requests.
    pub fn subscribe() -> (Handler, EventReceiver) {
        Handler::new(false, |event| {
            matches!(
                event.as_stanza(),
                Some(Stanza::Presence(presence)) if presence.type_ == PresenceType::Subscribe
            )
        })
    }

    /// The one IQ answering the request sent with `id`. One-shot.
    pub fn iq_id(id: impl Into<String>) -> (Handler, EventReceiver) {
        let id = id.into();
        Handler::new(true, move |event| {
            matches!(event.as_stanza(), Some(Stanza::Iq(iq)) if iq.id == id)
        })
    }

    /// Connection faults.
    pub fn connection_error() -> (Handler, EventReceiver) {
        Handler::new(false, Event::is_connection_error)
    }
}

/// Receiving side of a handler's event channel.
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventReceiver {
    /// Dequeue the next delivered event, giving up after `timeout`.
    pub async fn await_event(&mut self, timeout: Duration) -> Option<Event> {
        tokio::time::timeout(timeout, self.rx.recv()).await.ok().flatten()
    }

    /// Dequeue the next delivered event, waiting without limit. `None`
    /// once the handler has been removed and the queue is drained.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Dequeue without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

/// Thread-safe ordered handler set.
///
/// `fire` snapshots the current set under the lock and dispatches outside
/// it, newest handler first. A handler added while an event is in flight
/// does not see that event.
pub(crate) struct HandlerRegistry {
    handlers: Mutex<Vec<(HandlerId, Filter, bool, mpsc::UnboundedSender<Event>)>>,
    next_id: AtomicU64,
}

impl HandlerRegistry {
    pub fn new() -> HandlerRegistry {
        HandlerRegistry {
            handlers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn add(&self, handler: Handler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.handlers.lock().expect("handler registry poisoned");
        handlers.push((id, handler.filter, handler.one_shot, handler.tx));
        id
    }

    pub fn remove(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.lock().expect("handler registry poisoned");
        let before = handlers.len();
        handlers.retain(|(handler_id, ..)| *handler_id != id);
        handlers.len() != before
    }

    /// Deliver `event` to every matching handler, newest first. One-shot
    /// handlers and handlers whose receiver is gone are removed from the
    /// live set by id.
    pub fn fire(&self, event: &Event) {
        let snapshot: Vec<_> = {
            let handlers = self.handlers.lock().expect("handler registry poisoned");
            handlers
                .iter()
                .map(|(id, filter, one_shot, tx)| (*id, Arc::clone(filter), *one_shot, tx.clone()))
                .collect()
        };
        for (id, filter, one_shot, tx) in snapshot.into_iter().rev() {
            if !filter(event) {
                continue;
            }
            if tx.send(event.clone()).is_err() {
                // subscriber hung up; drop the handler
                self.remove(id);
                continue;
            }
            if one_shot {
                self.remove(id);
            }
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.handlers.lock().expect("handler registry poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stanza::{Iq, IqType, Message};

    fn iq_event(id: &str) -> Event {
        Event::Stanza(Stanza::Iq(Iq {
            id: id.into(),
            type_: IqType::Result,
            ..Iq::default()
        }))
    }

    #[tokio::test]
    async fn one_shot_delivers_exactly_once_and_unregisters() {
        let registry = HandlerRegistry::new();
        let (handler, mut events) = Handler::iq_id("ping-1");
        registry.add(handler);

        registry.fire(&iq_event("other"));
        assert!(events.try_recv().is_none(), "different id must not deliver");
        assert_eq!(registry.len(), 1);

        registry.fire(&iq_event("ping-1"));
        assert!(events.try_recv().is_some());
        assert_eq!(registry.len(), 0, "one-shot must unregister after delivery");

        registry.fire(&iq_event("ping-1"));
        assert!(events.try_recv().is_none(), "no delivery after removal");
    }

    #[tokio::test]
    async fn newest_handler_gets_the_event_first() {
        let registry = HandlerRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&order);
        let (h1, _events1) = Handler::new(false, move |_| {
            first.lock().unwrap().push("h1");
            true
        });
        let second = Arc::clone(&order);
        let (h2, _events2) = Handler::new(false, move |_| {
            second.lock().unwrap().push("h2");
            true
        });

        registry.add(h1);
        registry.add(h2);
        registry.fire(&iq_event("x"));

        assert_eq!(*order.lock().unwrap(), vec!["h2", "h1"]);
    }

    #[tokio::test]
    async fn chat_filter_requires_chat_type_and_body() {
        let registry = HandlerRegistry::new();
        let (handler, mut events) = Handler::chat();
        registry.add(handler);

        registry.fire(&Event::Stanza(Stanza::Message(Message::chat("a@b", "hi"))));
        assert!(events.try_recv().is_some());

        registry.fire(&Event::Stanza(Stanza::Message(Message {
            type_: MessageType::Chat,
            ..Message::default()
        })));
        assert!(events.try_recv().is_none(), "chat without body must not match");

        registry.fire(&Event::Stanza(Stanza::Message(Message {
            body: Some("hi".into()),
            ..Message::default()
        })));
        assert!(events.try_recv().is_none(), "normal message must not match");
    }

    #[tokio::test]
    async fn dropped_receiver_removes_handler_on_next_dispatch() {
        let registry = HandlerRegistry::new();
        let (handler, events) = Handler::new(false, |_| true);
        registry.add(handler);
        drop(events);

        registry.fire(&iq_event("x"));
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn await_event_times_out_on_silence() {
        let (_handler, mut events) = Handler::new(false, |_| true);
        assert!(events.await_event(Duration::from_millis(20)).await.is_none());
    }

    #[tokio::test]
    async fn removed_handler_gets_no_later_events() {
        let registry = HandlerRegistry::new();
        let (handler, mut events) = Handler::new(false, |_| true);
        let id = registry.add(handler);
        assert!(registry.remove(id));
        registry.fire(&iq_event("x"));
        assert!(events.try_recv().is_none());
    }
}
