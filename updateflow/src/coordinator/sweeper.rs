//! Background reclamation of stale contexts.

use super::UpdateCoordinator;
use crate::cancellation::CancellationToken;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// A tokio task that calls [`UpdateCoordinator::reclaim_stale`] on a fixed
/// cadence.
///
/// The task stops when [`stop`](Self::stop) is called, when the coordinator
/// shuts down, or when the coordinator is dropped.
#[derive(Debug)]
pub struct StaleContextSweeper {
    stop: Arc<CancellationToken>,
    handle: JoinHandle<()>,
}

impl StaleContextSweeper {
    /// Spawns the sweeper on the current tokio runtime.
    #[must_use]
    pub fn spawn(coordinator: &Arc<UpdateCoordinator>, interval: Duration) -> Self {
        let stop = coordinator.cancellation().child_token();
        let handle = tokio::spawn(sweep_loop(Arc::downgrade(coordinator), interval, Arc::clone(&stop)));
        Self { stop, handle }
    }

    /// Returns true once the task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops the sweeper and waits for it to exit.
    pub async fn stop(self) {
        self.stop.cancel("sweeper stopped");
        if let Err(e) = self.handle.await {
            debug!("Sweeper task ended abnormally: {}", e);
        }
    }
}

async fn sweep_loop(coordinator: Weak<UpdateCoordinator>, interval: Duration, stop: Arc<CancellationToken>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            () = stop.cancelled() => break,
            _ = ticker.tick() => {
                let Some(coordinator) = coordinator.upgrade() else {
                    break;
                };
                let reclaimed = coordinator.reclaim_stale();
                if reclaimed > 0 {
                    info!(reclaimed, "Sweeper reclaimed stale update contexts");
                }
            }
        }
    }

    debug!(reason = ?stop.reason(), "Sweeper exited");
}
