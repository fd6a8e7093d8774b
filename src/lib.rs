//! Asynchronous [XMPP](https://xmpp.org/) client core implementing the
//! RFC 3920/3921 streaming protocol with asynchronous I/O using
//! [tokio](https://tokio.rs/).
//!
//! # Getting started
//!
//! Build a [`Client`] from a [`ClientConfig`], call
//! [`connect`][Client::connect] with a `host:port` (or a blank host to
//! discover the server through DNS SRV), then register [`Handler`]s for
//! the events you care about and drive their [`EventReceiver`]s.
//!
//! ```no_run
//! use tokio_jabber::{Client, ClientConfig, Handler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tokio_jabber::Error> {
//!     let client = Client::new(ClientConfig::default());
//!     client.connect("", "romeo@example.net", "s3cr3t").await?;
//!
//!     let (chat, mut chats) = Handler::chat();
//!     client.add_handler(chat);
//!     client.send_presence_status("at the balcony").await?;
//!
//!     while let Some(event) = chats.recv().await {
//!         println!("chat: {:?}", event);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Feature set
//!
//! - [x] SRV discovery (`_xmpp-client._tcp`) with host:port fallback
//! - [x] HTTP CONNECT proxies via `HTTP_PROXY` / `http_proxy`
//! - [x] STARTTLS via rustls
//! - [x] SASL DIGEST-MD5 and PLAIN
//! - [x] Resource binding and session establishment
//! - [x] Filtered event handlers with one-shot semantics
//! - [x] XEP-0199 pings with bounded-retry reconnection
//!
//! Wire traffic is traced through the [`log`] facade at `trace` level;
//! point a logger such as `env_logger` at it to watch the XML fly by.

#![deny(unsafe_code, missing_docs, bare_trait_objects)]

pub mod auth;
mod client;
pub mod codec;
pub mod connect;
pub mod error;
mod event;
mod handler;
pub mod jid;
pub mod ns;
pub mod stanza;
pub mod util;

pub use crate::client::{Client, ClientConfig};
#[doc(inline)]
pub use crate::error::Error;
pub use crate::event::Event;
pub use crate::handler::{EventReceiver, Handler, HandlerId};
pub use crate::stanza::Stanza;
