//! The background loop driving one [`EventSource`][crate::EventSource]

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    session::{self, SessionEnd},
    shared::{Demand, Shared},
    source::Status,
};

/// Resolves as soon as the demand satisfies `until`, including right away
async fn wait(demand: &mut watch::Receiver<Demand>, until: impl Fn(Demand) -> bool) -> Demand {
    match demand.wait_for(|current| until(*current)).await {
        Ok(current) => *current,
        // the sender lives in `Shared`, which outlives this loop
        Err(_) => Demand::Closed,
    }
}

/// Waits for listeners, streams while they stay, backs off after failures.
/// Returns once the source is closed.
pub(crate) async fn run(shared: Arc<Shared>) {
    let mut demand = shared.subscribe();

    loop {
        if wait(&mut demand, |current| current != Demand::Idle).await == Demand::Closed {
            break;
        }
        if !shared.transition(Status::Connecting) {
            break;
        }

        let outcome = tokio::select! {
            biased;
            current = wait(&mut demand, |current| current != Demand::Wanted) => match current {
                Demand::Closed => Ok(SessionEnd::Closed),
                _ => Ok(SessionEnd::DemandDropped),
            },
            outcome = session::run(&shared) => outcome,
        };

        match outcome {
            Ok(SessionEnd::Closed) => break,
            Ok(SessionEnd::DemandDropped) => {
                debug!("no listeners left, disconnecting");
                if !shared.transition(Status::Disconnected) {
                    break;
                }
                continue;
            }
            Ok(SessionEnd::NoContent) => {
                info!("server has no more content, closing");
                shared.close();
                break;
            }
            Err(error) => {
                warn!(%error, "event stream failed");
                shared.notify_error(&error);
            }
        }

        let delay = shared.retry_interval();
        debug!(delay_ms = delay.as_millis(), "waiting before reconnect");
        tokio::select! {
            biased;
            _ = wait(&mut demand, |current| current == Demand::Closed) => break,
            () = tokio::time::sleep(delay) => {}
        }
        if !shared.transition(Status::Disconnected) {
            break;
        }
    }

    debug!("event source loop finished");
}
