//! Keeps the registry in step with the daemon at a fixed cadence.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::container::ContainerRegistry;

/// Spawns the refresh loop. Failures are logged and retried on the next
/// tick; the loop only stops when the returned handle is aborted.
pub fn spawn_refresh_loop(registry: Arc<ContainerRegistry>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reachable = true;

        loop {
            interval.tick().await;
            match registry.refresh().await {
                Ok(_) => {
                    if !reachable {
                        tracing::info!("Docker daemon reachable again");
                        reachable = true;
                    }
                }
                Err(e) => {
                    // Only the first failure in a row is worth a warning.
                    if reachable {
                        tracing::warn!("Registry refresh failed: {}", e);
                    } else {
                        tracing::debug!("Registry refresh still failing: {}", e);
                    }
                    reachable = false;
                }
            }
        }
    })
}
