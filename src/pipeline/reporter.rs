use std::sync::Arc;

use tracing::{debug, info};

use crate::types::JobCounters;
use crate::types::token::PipelineCancellationToken;

/// Emits a progress record at a fixed interval until its stop token fires.
/// The token is separate from the pipeline cancellation token so a final
/// report can still be read after the workers stop.
pub struct ProgressReporter {
    counters: Arc<JobCounters>,
    interval_seconds: u64,
    stop_token: PipelineCancellationToken,
}

impl ProgressReporter {
    pub fn new(
        counters: Arc<JobCounters>,
        interval_seconds: u64,
        stop_token: PipelineCancellationToken,
    ) -> Self {
        Self {
            counters,
            interval_seconds,
            stop_token,
        }
    }

    pub async fn report(&self) {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(self.interval_seconds));
        // the first tick fires immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let (in_flight, succeeded, failed) = self.counters.snapshot();
                    info!(
                        in_flight = in_flight,
                        succeeded = succeeded,
                        failed = failed,
                        "copy progress."
                    );
                },
                _ = self.stop_token.cancelled() => {
                    debug!("progress reporter has been stopped.");
                    return;
                }
            }
        }
    }
}
