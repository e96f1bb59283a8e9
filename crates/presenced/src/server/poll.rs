//! The dispatcher loop.
//!
//! Every `tick_interval` the loop takes the registry lock once, gives
//! every session one non-blocking read, and evicts sessions that timed
//! out or failed. Sessions are scanned whether or not they have pending
//! data, so the work per pass grows with the number of sessions and the
//! latency for input and timeouts is bounded by the tick interval.

use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::registry::Registry;

/// Fixed-interval dispatcher over the registry.
pub struct PollLoop {
    registry: Registry,
    tick_interval: Duration,
    cancel_token: CancellationToken,
}

impl PollLoop {
    pub fn new(
        registry: Registry,
        tick_interval: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            registry,
            tick_interval,
            cancel_token,
        }
    }

    /// Runs until the cancellation token fires.
    pub async fn run(self) {
        info!(tick_ms = self.tick_interval.as_millis() as u64, "Poll loop started");

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    debug!("Poll loop shutting down");
                    break;
                }
                _ = sleep(self.tick_interval) => {}
            }

            let report = self.registry.tick().await;
            if report.requests > 0 {
                trace!(requests = report.requests, "Handled requests");
            }
            if report.evicted() > 0 {
                debug!(
                    timed_out = report.timed_out,
                    disconnected = report.disconnected,
                    "Evicted sessions"
                );
            }
        }
    }
}
