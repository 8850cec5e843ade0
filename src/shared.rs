//! State shared between the public handle and the background loop

use core::time::Duration;
use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use bytes_utils::Str;
use parking_lot::{Mutex, MutexGuard, ReentrantMutex};
use reqwest::{Client, header::HeaderMap};
use tokio::sync::watch;
use tracing::{debug, warn};
use url::Url;

use crate::{
    errors::{EventSourceError, Result},
    message::Message,
    registry::ListenerRegistry,
    source::{EventContext, Status},
};

pub(crate) type UriFactory =
    Arc<dyn Fn(Option<&str>) -> Result<Url, url::ParseError> + Send + Sync>;
pub(crate) type OpenListener = Arc<dyn Fn(&EventContext, &Url) + Send + Sync>;
pub(crate) type ErrorListener = Arc<dyn Fn(&EventContext, &EventSourceError) + Send + Sync>;
pub(crate) type BeforeOpenHook = Arc<dyn Fn(&EventContext, &mut HeaderMap) + Send + Sync>;

/// What the background loop should be doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Demand {
    /// Nobody listens, hold no connection
    Idle,
    Wanted,
    /// Terminal
    Closed,
}

pub(crate) struct State {
    pub(crate) status: Status,
    pub(crate) uri: Option<Url>,
    pub(crate) last_event_id: Option<Str>,
    pub(crate) default_retry: Duration,
    pub(crate) retry_override: Option<Duration>,
    pub(crate) read_timeout: Duration,
    pub(crate) registry: ListenerRegistry,
    pub(crate) on_open: Option<OpenListener>,
    pub(crate) on_error: Option<ErrorListener>,
    pub(crate) on_before_open: Option<BeforeOpenHook>,
}

impl State {
    fn demand(&self) -> Demand {
        if self.status == Status::Closed {
            Demand::Closed
        } else if self.registry.has_listeners() {
            Demand::Wanted
        } else {
            Demand::Idle
        }
    }

    /// Server override if one was received, caller default otherwise
    pub(crate) fn retry_interval(&self) -> Duration {
        self.retry_override.unwrap_or(self.default_retry)
    }
}

pub(crate) struct Shared {
    state: Mutex<State>,
    /// Held while a listener is called and while closing, so nothing is notified once `close` returns.
    /// Reentrant because listeners may close the source themselves.
    gate: ReentrantMutex<()>,
    demand: watch::Sender<Demand>,
    factory: UriFactory,
    pub(crate) client: Client,
}

fn guarded(kind: &'static str, f: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
        warn!(listener = kind, "listener panicked, ignoring");
    }
}

impl Shared {
    pub(crate) fn new(
        factory: UriFactory,
        uri: Option<Url>,
        client: Client,
        default_retry: Duration,
        read_timeout: Duration,
    ) -> Self {
        Self {
            state: Mutex::new(State {
                status: Status::Disconnected,
                uri,
                last_event_id: None,
                default_retry,
                retry_override: None,
                read_timeout,
                registry: ListenerRegistry::default(),
                on_open: None,
                on_error: None,
                on_before_open: None,
            }),
            gate: ReentrantMutex::new(()),
            demand: watch::Sender::new(Demand::Idle),
            factory,
            client,
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock()
    }

    /// Mutates the state and wakes the loop if that changed the demand
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state();
        let result = f(&mut state);
        let demand = state.demand();
        self.demand.send_if_modified(|current| {
            if *current == demand {
                return false;
            }
            debug!(?demand, "demand changed");
            *current = demand;
            true
        });
        result
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Demand> {
        self.demand.subscribe()
    }

    pub(crate) fn demand(&self) -> Demand {
        *self.demand.borrow()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state().status == Status::Closed
    }

    /// Moves to `status` unless already closed
    pub(crate) fn transition(&self, status: Status) -> bool {
        let mut state = self.state();
        if state.status == Status::Closed {
            return false;
        }
        state.status = status;
        true
    }

    /// Returns `false` if it was closed already. Waits for a listener running on another thread.
    pub(crate) fn close(&self) -> bool {
        let _gate = self.gate.lock();
        self.update(|state| {
            let was_open = state.status != Status::Closed;
            state.status = Status::Closed;
            was_open
        })
    }

    /// Asks the URI factory where to connect next and records the answer
    pub(crate) fn resolve_target(&self) -> Result<Url> {
        let last_event_id = self.state().last_event_id.clone();
        let url = (self.factory)(last_event_id.as_deref())?;
        self.state().uri = Some(url.clone());
        Ok(url)
    }

    /// Records the final URL; `false` if the source was closed meanwhile
    pub(crate) fn mark_connected(&self, url: Url) -> bool {
        let mut state = self.state();
        if state.status == Status::Closed {
            return false;
        }
        state.status = Status::Connected;
        state.uri = Some(url);
        true
    }

    pub(crate) fn retry_interval(&self) -> Duration {
        self.state().retry_interval()
    }

    fn context(self: &Arc<Self>) -> EventContext {
        EventContext::new(Arc::clone(self), None)
    }

    /// Calls a listener unless the source is closed; `false` if it was
    fn deliver(&self, kind: &'static str, f: impl FnOnce()) -> bool {
        let _gate = self.gate.lock();
        if self.is_closed() {
            return false;
        }
        guarded(kind, f);
        true
    }

    pub(crate) fn dispatch(self: &Arc<Self>, message: &Message) {
        let recipients = self.state().registry.recipients(message);
        let named = recipients.named.iter().flat_map(|list| list.iter().cloned());
        for (id, listener) in recipients.any.clone().into_iter().chain(named) {
            let context = EventContext::new(Arc::clone(self), Some(id));
            if !self.deliver("message", || listener(&context, message)) {
                return;
            }
        }
    }

    pub(crate) fn notify_open(self: &Arc<Self>, url: &Url) {
        let listener = self.state().on_open.clone();
        if let Some(listener) = listener {
            let context = self.context();
            self.deliver("open", || listener(&context, url));
        }
    }

    pub(crate) fn notify_error(self: &Arc<Self>, error: &EventSourceError) {
        let listener = self.state().on_error.clone();
        if let Some(listener) = listener {
            let context = self.context();
            self.deliver("error", || listener(&context, error));
        }
    }

    pub(crate) fn before_open(self: &Arc<Self>, headers: &mut HeaderMap) {
        let hook = self.state().on_before_open.clone();
        if let Some(hook) = hook {
            let context = self.context();
            guarded("before-open", || hook(&context, headers));
        }
    }
}
