//! An auto-reconnecting [Server-Sent Events](https://html.spec.whatwg.org/multipage/server-sent-events.html)
//! client that only holds a connection while somebody is listening.
//!
//! `sse-eventsource` is built in layers:
//!
//! - [`EventSource`] - the subscription. Register listeners and it connects, remove the last one
//!   and it disconnects. Reconnects after failures with the retry interval the server asked for,
//!   resuming with `Last-Event-ID`.
//! - [`LineStream`][line_stream::LineStream] - a [`Stream`][futures_core::Stream] adapter cutting
//!   any `Stream<Item = Result<impl AsRef<[u8]>, E>>` into lines.
//! - [`EventAccumulator`][accumulator::EventAccumulator] plus the low-level
//!   [`parser::parse_line`] and [`parser::parse_line_from_buffer`] for custom integrations.
//! - [`UriList`] - a small reader for `text/uri-list` resources.
//!
//! # Quick start
//!
//! ```no_run
//! use sse_eventsource::EventSource;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = EventSource::from_uri_str("https://example.com/events")?;
//! source
//!     .on_open(|_, url| println!("connected to {url}"))
//!     .on_error(|_, error| eprintln!("error: {error}"));
//!
//! // the first listener opens the connection
//! let id = source.add_event_listener("update", |_, message| {
//!     println!("{}", message.data());
//! });
//!
//! tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!
//! // and the last one closes it again
//! source.remove_event_listener("update", id);
//! # Ok(())
//! # }
//! ```
//!
//! # Resumable addresses
//!
//! Endpoints that encode the position in the URI instead of relying on `Last-Event-ID`
//! can be served by a factory, asked for the address before every attempt:
//!
//! ```no_run
//! use sse_eventsource::EventSource;
//! use url::Url;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = EventSource::from_uri_factory(|last_event_id| {
//!     Url::parse(&format!("https://example.com/feed/{}", last_event_id.unwrap_or("0")))
//! })?;
//! source.on_message(|context, message| {
//!     if message.data() == "bye" {
//!         context.close();
//!     }
//! });
//! # Ok(())
//! # }
//! ```
//!
//! # Feature flags
//!
//! | Feature | Default | Description |
//! | --- | --- | --- |
//! | `serde` | off | Derives [`Serialize`][::serde::Serialize] and [`Deserialize`][::serde::Deserialize] on [`Message`] and enables `serde` support in [`bytes-utils`][bytes_utils]. |
//! | `json` | off | Adds [`Message::json`] to deserialise the data of a message via [`serde_json`]. |

pub mod accumulator;
mod auth;
pub(crate) mod constants;
pub mod errors;
mod lifecycle;
pub mod line_stream;
pub mod message;
pub mod parser;
pub mod registry;
mod request;
mod session;
mod shared;
pub mod source;
mod transport;
pub mod uri_list;

pub use constants::{DEFAULT_READ_TIMEOUT, DEFAULT_RETRY};
pub use errors::{EventSourceError, Result};
pub use message::Message;
pub use registry::{ListenerId, MessageListener};
pub use source::{EventContext, EventSource, EventSourceBuilder, Status};
pub use uri_list::UriList;
