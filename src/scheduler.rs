use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::coordinator::{Coordinator, CycleOutcome};
use crate::feeds::FeedClient;
use crate::models::{RawAlert, RawForecastPoint, RawObservation};

/// Periodic refresh of one coordinator with an explicit start/stop lifecycle
pub struct RefreshTask {
    handle: JoinHandle<()>,
}

impl RefreshTask {
    /// Spawns the refresh loop. The first cycle runs immediately.
    pub fn start<F, O, A>(coordinator: Coordinator<F, O, A>) -> Self
    where
        F: FeedClient<Payload = Vec<RawForecastPoint>> + 'static,
        O: FeedClient<Payload = RawObservation> + 'static,
        A: FeedClient<Payload = Vec<RawAlert>> + 'static,
    {
        let handle = tokio::spawn(async move {
            start_refresh_scheduler(coordinator).await;
        });
        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stops the loop. An in-flight cycle is abandoned and publishes nothing.
    pub async fn stop(self) {
        self.handle.abort();
        match self.handle.await {
            Err(e) if e.is_cancelled() => info!("Refresh task stopped"),
            Err(e) => error!("Refresh task ended abnormally: {}", e),
            Ok(()) => info!("Refresh task finished"),
        }
    }
}

/// Runs refresh cycles forever on the coordinator's interval.
///
/// Cycles never overlap: a cycle that overruns the interval makes the
/// scheduler skip the missed ticks.
#[instrument(skip(coordinator), fields(station_id = %coordinator.station_id()))]
pub async fn start_refresh_scheduler<F, O, A>(mut coordinator: Coordinator<F, O, A>)
where
    F: FeedClient<Payload = Vec<RawForecastPoint>>,
    O: FeedClient<Payload = RawObservation>,
    A: FeedClient<Payload = Vec<RawAlert>>,
{
    let period = coordinator.settings().refresh_interval;
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Refresh scheduler started with {:?} interval", period);

    loop {
        interval.tick().await;
        debug!("Scheduler tick - starting refresh cycle");

        match coordinator.refresh().await {
            Ok(CycleOutcome::Published { degraded: false }) => {
                debug!("Refresh cycle published a fresh snapshot");
            }
            Ok(CycleOutcome::Published { degraded: true }) => {
                warn!("Refresh cycle published a degraded snapshot");
            }
            Ok(CycleOutcome::Retained) => {
                warn!("Refresh cycle failed, previous snapshot retained");
            }
            Err(e) => {
                error!("Refresh cycle failed: {}", e);
            }
        }
    }
}
