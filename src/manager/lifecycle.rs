//! Shutdown coordination.

use crate::error::Result;
use crate::types::{CancelOutcome, Event};
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::TaskManager;

/// Interval between checks for workers that are still running
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(50);

impl TaskManager {
    /// Gracefully shut down the manager
    ///
    /// 1. Stops accepting new downloads ([`start_download`](Self::start_download)
    ///    returns [`Error::ShuttingDown`](crate::Error::ShuttingDown) from now on)
    /// 2. Requests cancellation of every task that has not finished
    /// 3. Waits up to `config.shutdown_timeout` for running workers to stop
    /// 4. Emits [`Event::Shutdown`]
    ///
    /// Workers that never report progress cannot observe cancellation and
    /// may still be running when this returns; their tasks stay `running`.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new downloads");

        self.cancel_all();

        let shutdown_timeout = self.config.shutdown_timeout;
        match tokio::time::timeout(shutdown_timeout, self.wait_for_live_workers()).await {
            Ok(()) => {
                tracing::info!("All workers stopped");
            }
            Err(_) => {
                tracing::warn!(
                    still_running = self.registry.live_count(),
                    timeout_secs = shutdown_timeout.as_secs(),
                    "Timeout waiting for workers to stop, proceeding with shutdown"
                );
            }
        }

        self.event_tx.send(Event::Shutdown).ok();

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Whether [`shutdown`](Self::shutdown) has begun
    pub fn is_shutting_down(&self) -> bool {
        !self.accepting_new.load(Ordering::SeqCst)
    }

    /// Request cancellation of every task that is not terminal yet
    fn cancel_all(&self) {
        let active = self.registry.active_ids();
        tracing::debug!(active_count = active.len(), "Canceling all active tasks");

        for id in active {
            if self.registry.request_cancel(&id) == CancelOutcome::Canceled {
                self.event_tx.send(Event::Canceled { id }).ok();
            }
        }
    }

    async fn wait_for_live_workers(&self) {
        loop {
            let live = self.registry.live_count();
            if live == 0 {
                return;
            }

            tracing::debug!(live, "Waiting for workers to stop");
            tokio::time::sleep(SHUTDOWN_POLL_INTERVAL).await;
        }
    }
}
