//! One connection attempt: open, read line by line, dispatch.

use core::time::Duration;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{StreamExt, stream::{self, BoxStream}};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::{
    accumulator::{EventAccumulator, Step},
    errors::{EventSourceError, Result},
    line_stream::LineStream,
    parser::parse_line,
    request::event_stream_headers,
    shared::{Demand, Shared},
    transport,
};

/// How a session finished when it did not fail
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    /// Every listener went away while streaming
    DemandDropped,
    /// The source was closed while streaming
    Closed,
    /// The server answered `204 No Content`
    NoContent,
}

/// Runs a session until it ends. A clean end of stream that is not a `204` is
/// reported as [`EventSourceError::StreamEnded`].
pub(crate) async fn run(shared: &Arc<Shared>) -> Result<SessionEnd> {
    let url = shared.resolve_target()?;
    let (last_event_id, read_timeout) = {
        let state = shared.state();
        (state.last_event_id.clone(), state.read_timeout)
    };

    let mut headers = event_stream_headers(&url, last_event_id.as_deref());
    shared.before_open(&mut headers);

    info!(url = %url, "connecting");
    let connection = transport::open(&shared.client, &url, headers, read_timeout).await?;

    if !shared.mark_connected(connection.url.clone()) {
        return Ok(SessionEnd::Closed);
    }
    info!(url = %connection.url, status = ?connection.status, "connected");
    shared.notify_open(&connection.url);

    if let Some(retry) = connection.retry_after() {
        debug!(retry_ms = retry.as_millis(), "retry-after received");
        shared.state().retry_override = Some(retry);
    }

    if connection.is_no_content() {
        info!(url = %connection.url, "server answered no content");
        return Ok(SessionEnd::NoContent);
    }

    let mut accumulator = EventAccumulator::new(last_event_id);
    let mut lines = LineStream::new(with_read_timeout(connection.body, read_timeout));

    loop {
        let line = match lines.next().await {
            None => {
                debug!("stream ended");
                return Err(EventSourceError::StreamEnded);
            }
            Some(line) => line?,
        };

        match parse_line(line) {
            Ok(line) => {
                if let Some(step) = accumulator.feed(line) {
                    apply(shared, step);
                }
            }
            Err(error) => debug!(%error, "skipping line that is not valid utf-8"),
        }

        // listeners run inline, so they may have changed the demand since the last poll
        match shared.demand() {
            Demand::Wanted => {}
            Demand::Idle => return Ok(SessionEnd::DemandDropped),
            Demand::Closed => return Ok(SessionEnd::Closed),
        }
    }
}

/// Fails the body once `read_timeout` passes without a single chunk arriving
fn with_read_timeout(
    body: BoxStream<'static, Result<Bytes>>,
    read_timeout: Duration,
) -> BoxStream<'static, Result<Bytes>> {
    stream::unfold(Some(body), move |body| async move {
        let mut body = body?;
        match timeout(read_timeout, body.next()).await {
            Ok(Some(chunk)) => Some((chunk, Some(body))),
            Ok(None) => None,
            Err(_) => Some((Err(EventSourceError::Timeout(read_timeout)), None)),
        }
    })
    .boxed()
}

fn apply(shared: &Arc<Shared>, step: Step) {
    match step {
        Step::Dispatch(message) | Step::Comment(message) => shared.dispatch(&message),
        Step::LastEventId(id) => shared.state().last_event_id = Some(id),
        Step::Retry(retry) => {
            debug!(retry_ms = retry.as_millis(), "retry field received");
            shared.state().default_retry = retry;
        }
    }
}
