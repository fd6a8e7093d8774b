use std::sync::Arc;

use crate::stanza::Stanza;
use crate::Error;

/// What the client hands to registered handlers: either a decoded stanza
/// from the wire, or a fatal connection fault.
///
/// Events are `Clone` because a single event may match several handlers.
#[derive(Debug, Clone)]
pub enum Event {
    /// A stanza read from the stream
    Stanza(Stanza),
    /// The connection failed; carries the underlying error and a short
    /// human-readable context string.
    ConnectionError {
        /// What went wrong
        error: Arc<Error>,
        /// Where it went wrong ("receive stanza error", …)
        message: String,
    },
}

impl Event {
    /// If this is a `Stanza` event, get its data
    pub fn as_stanza(&self) -> Option<&Stanza> {
        match self {
            Event::Stanza(stanza) => Some(stanza),
            _ => None,
        }
    }

    /// If this is a `Stanza` event, unwrap into its data
    pub fn into_stanza(self) -> Option<Stanza> {
        match self {
            Event::Stanza(stanza) => Some(stanza),
            _ => None,
        }
    }

    /// `ConnectionError` event?
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Event::ConnectionError { .. })
    }
}

impl From<Stanza> for Event {
    fn from(stanza: Stanza) -> Self {
        Event::Stanza(stanza)
    }
}
