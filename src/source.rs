//! The public [`EventSource`] handle

use core::{fmt, time::Duration};
use std::sync::Arc;

use bytes_utils::Str;
use reqwest::{Client, header::HeaderMap};
use tokio::task::JoinHandle;
use tracing::info;
use url::{ParseError, Url};

use crate::{
    constants::{DEFAULT_READ_TIMEOUT, DEFAULT_RETRY},
    errors::{EventSourceError, Result},
    lifecycle,
    message::Message,
    registry::ListenerId,
    shared::{Shared, UriFactory},
};

/// Connection status of an [`EventSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Initial state, and whenever no connection is held
    Disconnected,
    /// Somebody listens and a connection attempt is in progress
    Connecting,
    /// Response received, messages are streaming
    Connected,
    /// Terminal, reached through [`EventSource::close`] or a `204 No Content` response
    Closed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Disconnected => "DISCONNECTED",
            Status::Connecting => "CONNECTING",
            Status::Connected => "CONNECTED",
            Status::Closed => "CLOSED",
        }
        .fmt(f)
    }
}

/// Handed to every listener invocation.
///
/// Gives listeners a way back to the source that called them, e.g. to close it
/// or to detach themselves after the first message.
pub struct EventContext {
    shared: Arc<Shared>,
    listener: Option<ListenerId>,
}

impl EventContext {
    pub(crate) fn new(shared: Arc<Shared>, listener: Option<ListenerId>) -> Self {
        Self { shared, listener }
    }

    pub fn status(&self) -> Status {
        self.shared.state().status
    }

    pub fn uri(&self) -> Option<Url> {
        self.shared.state().uri.clone()
    }

    pub fn last_event_id(&self) -> Option<Str> {
        self.shared.state().last_event_id.clone()
    }

    /// Token of the message listener being invoked, [None] for open, error and before-open listeners
    pub fn listener_id(&self) -> Option<ListenerId> {
        self.listener
    }

    /// Unregisters the message listener being invoked. Returns `false` if there is none.
    pub fn remove_listener(&self) -> bool {
        match self.listener {
            Some(id) => self.shared.update(|state| state.registry.remove_id(id)),
            None => false,
        }
    }

    /// Closes the source, no further notifications follow
    pub fn close(&self) {
        if self.shared.close() {
            info!("event source closed by listener");
        }
    }
}

impl fmt::Debug for EventContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventContext")
            .field("listener", &self.listener)
            .finish_non_exhaustive()
    }
}

/// Where an [`EventSource`] connects to
enum Target {
    Fixed(Url),
    Text(String),
    Factory(UriFactory),
}

impl Target {
    fn into_parts(self) -> (UriFactory, Option<Url>) {
        match self {
            Target::Fixed(url) => {
                let initial = url.clone();
                let factory: UriFactory =
                    Arc::new(move |_: Option<&str>| Ok::<_, ParseError>(url.clone()));
                (factory, Some(initial))
            }
            // parse failures surface through the error listener, not here
            Target::Text(text) => {
                let initial = Url::parse(&text).ok();
                let factory: UriFactory = Arc::new(move |_: Option<&str>| Url::parse(&text));
                (factory, initial)
            }
            Target::Factory(factory) => (factory, None),
        }
    }
}

/// Builder for an [`EventSource`] with non-default settings
#[must_use]
pub struct EventSourceBuilder {
    target: Target,
    client: Option<Client>,
    default_retry: Duration,
    read_timeout: Duration,
}

impl EventSourceBuilder {
    fn with_target(target: Target) -> Self {
        Self {
            target,
            client: None,
            default_retry: DEFAULT_RETRY,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn new(url: Url) -> Self {
        Self::with_target(Target::Fixed(url))
    }

    /// The string is parsed on every connection attempt; a malformed one is reported to the error listener
    pub fn from_uri_str(uri: impl Into<String>) -> Self {
        Self::with_target(Target::Text(uri.into()))
    }

    /// The factory is asked for the address before every connection attempt, with the last event id
    pub fn from_uri_factory<F>(factory: F) -> Self
    where
        F: Fn(Option<&str>) -> Result<Url, ParseError> + Send + Sync + 'static,
    {
        Self::with_target(Target::Factory(Arc::new(factory)))
    }

    /// Use a preconfigured client, e.g. with proxies or custom TLS roots
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn default_retry(mut self, retry: Duration) -> Self {
        self.default_retry = retry;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Spawns the background loop onto the current tokio runtime.
    ///
    /// # Errors
    ///
    /// [`EventSourceError::NoRuntime`] outside of a runtime, [`EventSourceError::Http`] if the
    /// default client cannot be built.
    pub fn build(self) -> Result<EventSource> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| EventSourceError::NoRuntime)?;
        let client = match self.client {
            Some(client) => client,
            None => Client::builder().build()?,
        };
        let (factory, uri) = self.target.into_parts();
        let shared = Arc::new(Shared::new(
            factory,
            uri,
            client,
            self.default_retry,
            self.read_timeout,
        ));
        let task = runtime.spawn(lifecycle::run(Arc::clone(&shared)));
        Ok(EventSource { shared, task })
    }
}

/// Auto-reconnecting subscription to a `text/event-stream` resource.
///
/// A connection is only held while at least one message listener is registered: the
/// first registration connects, removing the last one disconnects. Every method takes
/// `&self` and may be called from any thread, including from inside a listener.
///
/// Message, open and error notifications of one source are delivered one at a time, in
/// the order the stream produced them. The relative order in which the any-message
/// listener and the type specific listeners see the same message is unspecified.
///
/// Dropping the handle closes the source.
pub struct EventSource {
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl EventSource {
    /// # Errors
    ///
    /// See [`EventSourceBuilder::build`]
    pub fn new(url: Url) -> Result<Self> {
        EventSourceBuilder::new(url).build()
    }

    /// # Errors
    ///
    /// See [`EventSourceBuilder::build`]
    pub fn from_uri_str(uri: impl Into<String>) -> Result<Self> {
        EventSourceBuilder::from_uri_str(uri).build()
    }

    /// # Errors
    ///
    /// See [`EventSourceBuilder::build`]
    pub fn from_uri_factory<F>(factory: F) -> Result<Self>
    where
        F: Fn(Option<&str>) -> Result<Url, ParseError> + Send + Sync + 'static,
    {
        EventSourceBuilder::from_uri_factory(factory).build()
    }

    pub fn builder(url: Url) -> EventSourceBuilder {
        EventSourceBuilder::new(url)
    }

    pub fn status(&self) -> Status {
        self.shared.state().status
    }

    /// Last requested address, or once connected, the address data actually comes from
    pub fn uri(&self) -> Option<Url> {
        self.shared.state().uri.clone()
    }

    pub fn last_event_id(&self) -> Option<Str> {
        self.shared.state().last_event_id.clone()
    }

    /// Delay before the next reconnect: a `Retry-After` header if one was received,
    /// otherwise the default (which `retry:` fields overwrite)
    pub fn retry_interval(&self) -> Duration {
        self.shared.retry_interval()
    }

    pub fn default_retry(&self) -> Duration {
        self.shared.state().default_retry
    }

    pub fn set_default_retry(&self, retry: Duration) -> &Self {
        self.shared.state().default_retry = retry;
        self
    }

    pub fn read_timeout(&self) -> Duration {
        self.shared.state().read_timeout
    }

    /// Bounds the wait for response headers and the silence between two body chunks, from the next attempt on
    pub fn set_read_timeout(&self, timeout: Duration) -> &Self {
        self.shared.state().read_timeout = timeout;
        self
    }

    /// Sets the listener that sees every message, comments included
    pub fn on_message<F>(&self, listener: F) -> &Self
    where
        F: Fn(&EventContext, &Message) + Send + Sync + 'static,
    {
        self.shared
            .update(|state| state.registry.set_any(Arc::new(listener)));
        self
    }

    pub fn clear_on_message(&self) -> &Self {
        self.shared.update(|state| state.registry.clear_any());
        self
    }

    /// Called with the final address each time a connection is established
    pub fn on_open<F>(&self, listener: F) -> &Self
    where
        F: Fn(&EventContext, &Url) + Send + Sync + 'static,
    {
        self.shared.state().on_open = Some(Arc::new(listener));
        self
    }

    pub fn clear_on_open(&self) -> &Self {
        self.shared.state().on_open = None;
        self
    }

    /// Called with every failed or ended connection, right before the retry delay
    pub fn on_error<F>(&self, listener: F) -> &Self
    where
        F: Fn(&EventContext, &EventSourceError) + Send + Sync + 'static,
    {
        self.shared.state().on_error = Some(Arc::new(listener));
        self
    }

    pub fn clear_on_error(&self) -> &Self {
        self.shared.state().on_error = None;
        self
    }

    /// Runs once per connection attempt with the complete request headers, which it may change
    pub fn on_before_open<F>(&self, hook: F) -> &Self
    where
        F: Fn(&EventContext, &mut HeaderMap) + Send + Sync + 'static,
    {
        self.shared.state().on_before_open = Some(Arc::new(hook));
        self
    }

    pub fn clear_on_before_open(&self) -> &Self {
        self.shared.state().on_before_open = None;
        self
    }

    /// Registers a listener for messages of `event_type`; `"message"` receives untyped events
    pub fn add_event_listener<F>(&self, event_type: &str, listener: F) -> ListenerId
    where
        F: Fn(&EventContext, &Message) + Send + Sync + 'static,
    {
        self.shared
            .update(|state| state.registry.add(event_type, Arc::new(listener)))
    }

    /// Returns `false` if `id` was not registered for `event_type`
    pub fn remove_event_listener(&self, event_type: &str, id: ListenerId) -> bool {
        self.shared
            .update(|state| state.registry.remove(event_type, id))
    }

    /// Closes the source for good. No notification fires once this returns, even if a read was in progress.
    ///
    /// A listener running on another thread at that moment is waited for.
    pub fn close(&self) {
        if self.shared.close() {
            info!("event source closed");
        }
        self.task.abort();
    }
}

impl fmt::Debug for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state();
        f.debug_struct("EventSource")
            .field("status", &state.status)
            .field("uri", &state.uri)
            .field("last_event_id", &state.last_event_id)
            .finish_non_exhaustive()
    }
}

impl Drop for EventSource {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_disconnected_with_given_uri() {
        let url = Url::parse("https://example.com/events").unwrap();
        let source = EventSource::new(url.clone()).unwrap();
        assert_eq!(source.status(), Status::Disconnected);
        assert_eq!(source.uri(), Some(url));
        assert_eq!(source.last_event_id(), None);
        assert_eq!(source.retry_interval(), DEFAULT_RETRY);
        assert_eq!(source.read_timeout(), DEFAULT_READ_TIMEOUT);
    }

    #[tokio::test]
    async fn string_uri() {
        let source = EventSource::from_uri_str("https://example.com/events").unwrap();
        assert_eq!(source.uri().unwrap().as_str(), "https://example.com/events");

        let relative = EventSource::from_uri_str("not/an/absolute/url").unwrap();
        assert_eq!(relative.uri(), None);
        assert_eq!(relative.status(), Status::Disconnected);
    }

    #[test]
    fn needs_a_runtime() {
        let result = EventSource::from_uri_str("https://example.com/events");
        assert!(matches!(result, Err(EventSourceError::NoRuntime)));
    }

    #[tokio::test]
    async fn close_is_terminal() {
        let source = EventSource::from_uri_str("https://example.com/events").unwrap();
        source.close();
        assert_eq!(source.status(), Status::Closed);
        source.on_message(|_, _| {});
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(source.status(), Status::Closed);
    }

    #[tokio::test]
    async fn retry_settings() {
        let source = EventSourceBuilder::from_uri_str("https://example.com/events")
            .default_retry(Duration::from_millis(10))
            .read_timeout(Duration::from_millis(500))
            .build()
            .unwrap();
        assert_eq!(source.retry_interval(), Duration::from_millis(10));
        source.set_default_retry(Duration::from_secs(3));
        assert_eq!(source.default_retry(), Duration::from_secs(3));
        assert_eq!(source.retry_interval(), Duration::from_secs(3));
        assert_eq!(source.read_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn status_display() {
        assert_eq!(Status::Connected.to_string(), "CONNECTED");
    }
}
