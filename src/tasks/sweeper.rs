use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::services::session_registry::SessionRegistry;

/// Evicts ended sessions every `every` until shutdown is broadcast.
pub(crate) async fn run(
    registry: Arc<SessionRegistry>,
    every: Duration,
    retention: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tick = interval(every);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                let evicted = registry.evict_ended(retention).await;
                if evicted > 0 {
                    let remaining = registry.len().await;
                    tracing::info!(evicted, remaining, "session sweep finished");
                }
            }
        }
    }

    tracing::info!("session sweeper stopped");
}
