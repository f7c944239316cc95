//! Connectivity Probe Task
//!
//! Background task that watches origin reachability and emits the
//! reconnection signal that drains the sync queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::fetch::Transport;
use crate::worker::{OfflineWorker, SyncOutcome};

/// Spawns a task that probes the origin every `interval_secs` seconds.
///
/// Every successful probe while writes are pending delivers the configured
/// sync tag to the worker, so records queued between two online probes are
/// replayed on the next tick. The handle is aborted during graceful shutdown.
pub fn spawn_connectivity_task<T: Transport>(
    worker: Arc<OfflineWorker<T>>,
    interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting connectivity probe with interval of {} seconds",
            interval_secs
        );

        let tag = worker.config().sync_tag.clone();
        let mut online: Option<bool> = None;

        loop {
            let reachable = worker.probe().await;

            let pending = reachable && !worker.queue().is_empty().await;
            if online != Some(reachable) {
                if reachable {
                    info!("Origin reachable");
                } else {
                    warn!("Origin unreachable, serving from cache");
                }
            }
            online = Some(reachable);

            if pending {
                match worker.sync(&tag).await {
                    Ok(SyncOutcome::Drained(report)) => debug!(
                        "Reconnection drain: replayed {}, remaining {}",
                        report.replayed, report.remaining
                    ),
                    Ok(outcome) => debug!("Reconnection drain: {:?}", outcome),
                    Err(e) => warn!("Reconnection drain failed: {}", e),
                }
            }

            tokio::time::sleep(interval).await;
        }
    })
}
