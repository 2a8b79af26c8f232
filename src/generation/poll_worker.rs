use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::remote::with_deadline;

use super::coordinator::GenerationCoordinator;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Shared loop behind every pending request: refresh once, then evaluate all.
///
/// Exits when cancelled or when a tick leaves the live set empty.
pub async fn polling_loop(coordinator: GenerationCoordinator, poller_id: u64, cancel: CancellationToken) {
    let period = coordinator.config().interval();
    let refresh_timeout = coordinator.config().refresh_timeout();
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_info!("generation polling started (every {}s)", period.as_secs());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let source = coordinator.source();
                let refreshed = match with_deadline("refresh", refresh_timeout, source.refresh()).await {
                    Ok(records) => Some(records),
                    Err(err) if err.is_timeout() => {
                        log_warn!("{err}, evaluating previous view");
                        None
                    }
                    Err(err) => {
                        log_error!("record refresh failed, evaluating previous view: {err:#}");
                        None
                    }
                };

                if !coordinator.finish_tick(poller_id, &cancel, refreshed) {
                    break;
                }
            }
            _ = cancel.cancelled() => {
                break;
            }
        }
    }

    log_info!("generation polling stopped");
}
