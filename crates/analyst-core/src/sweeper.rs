//! Background eviction of expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::cache::Sweep;

/// Run one pass over every target, returning the total evicted
pub fn sweep_all(targets: &[Arc<dyn Sweep>]) -> usize {
    targets
        .iter()
        .map(|target| {
            let removed = target.sweep();
            if removed > 0 {
                tracing::debug!(cache = target.name(), removed, "Evicted expired entries");
            }
            removed
        })
        .sum()
}

/// Spawn the periodic sweeper. Abort the handle to stop it.
pub fn spawn_sweeper(targets: Vec<Arc<dyn Sweep>>, period: Duration) -> JoinHandle<()> {
    tracing::info!(
        caches = targets.len(),
        period_secs = period.as_secs(),
        "Starting cache sweeper"
    );

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            sweep_all(&targets);
        }
    })
}
