//! Aggregation coordinator: one refresh cycle per call, one published
//! snapshot per station.
//!
//! The coordinator exclusively owns the current [`WeatherSnapshot`]. A cycle
//! fetches all three feeds concurrently, waits for every one of them to
//! settle, merges what arrived and then publishes the new snapshot in a single
//! step. Readers hold a [`SnapshotReader`] and always see one complete
//! snapshot.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::alerts::{process_alerts, retain_active};
use crate::config::{utc, DEFAULT_ALERT_LANGUAGE, DEFAULT_ALERT_REGION};
use crate::fetch_error::{FetchError, FetchErrorKind};
use crate::feeds::{fetch_within, FeedClient};
use crate::merge::{build_series, hourly_window, merge_current};
use crate::models::{
    FeedStatus, FeedStatuses, RawAlert, RawForecastPoint, RawObservation, StationId,
    WeatherSnapshot,
};

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub alert_language: String,
    pub alert_region: String,
    pub refresh_interval: Duration,
    /// Budget for each feed call, independent of the others
    pub fetch_timeout: Duration,
    /// Station-local offset used for daily aggregation
    pub utc_offset: FixedOffset,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            alert_language: DEFAULT_ALERT_LANGUAGE.to_string(),
            alert_region: DEFAULT_ALERT_REGION.to_string(),
            refresh_interval: Duration::from_secs(10 * 60),
            fetch_timeout: Duration::from_secs(20),
            utc_offset: utc(),
        }
    }
}

/// Where the coordinator is within a refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Idle,
    Fetching,
    Merging,
    PartialFailure,
    TotalFailure,
    Published,
    Retained,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A new snapshot replaced the previous one
    Published { degraded: bool },
    /// Every feed failed; the previous snapshot stays current
    Retained,
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("No weather data available for station {0}")]
    NoDataAvailable(StationId),
}

type SnapshotSlot = Option<Arc<WeatherSnapshot>>;

/// Read-only handle on the published snapshot
#[derive(Clone)]
pub struct SnapshotReader {
    receiver: watch::Receiver<SnapshotSlot>,
    statuses: watch::Receiver<FeedStatuses>,
}

impl SnapshotReader {
    /// The latest complete snapshot, if one was ever published
    pub fn snapshot(&self) -> Option<Arc<WeatherSnapshot>> {
        self.receiver.borrow().clone()
    }

    pub fn has_snapshot(&self) -> bool {
        self.receiver.borrow().is_some()
    }

    /// Per-feed outcomes as of the latest cycle, published or not
    pub fn feed_statuses(&self) -> FeedStatuses {
        self.statuses.borrow().clone()
    }

    /// Waits for the next publish. Returns false once the coordinator is gone.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }
}

pub struct Coordinator<F, O, A> {
    station_id: StationId,
    settings: CoordinatorSettings,
    forecast_client: F,
    observation_client: O,
    alert_client: A,
    publisher: watch::Sender<SnapshotSlot>,
    status_publisher: watch::Sender<FeedStatuses>,
    feeds: FeedStatuses,
    state: CycleState,
}

impl<F, O, A> Coordinator<F, O, A>
where
    F: FeedClient<Payload = Vec<RawForecastPoint>>,
    O: FeedClient<Payload = RawObservation>,
    A: FeedClient<Payload = Vec<RawAlert>>,
{
    pub fn new(
        station_id: StationId,
        settings: CoordinatorSettings,
        forecast_client: F,
        observation_client: O,
        alert_client: A,
    ) -> Self {
        let (publisher, _) = watch::channel(None);
        let (status_publisher, _) = watch::channel(FeedStatuses::default());
        Self {
            station_id,
            settings,
            forecast_client,
            observation_client,
            alert_client,
            publisher,
            status_publisher,
            feeds: FeedStatuses::default(),
            state: CycleState::Idle,
        }
    }

    pub fn station_id(&self) -> &StationId {
        &self.station_id
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Outcome history of each feed, including cycles that published nothing
    pub fn feed_statuses(&self) -> &FeedStatuses {
        &self.feeds
    }

    pub fn subscribe(&self) -> SnapshotReader {
        SnapshotReader {
            receiver: self.publisher.subscribe(),
            statuses: self.status_publisher.subscribe(),
        }
    }

    pub fn snapshot(&self) -> Option<Arc<WeatherSnapshot>> {
        self.publisher.borrow().clone()
    }

    pub async fn refresh(&mut self) -> Result<CycleOutcome, CoordinatorError> {
        self.refresh_at(Utc::now()).await
    }

    /// Runs one refresh cycle as of `now`
    #[instrument(skip(self), fields(station_id = %self.station_id))]
    pub async fn refresh_at(&mut self, now: DateTime<Utc>) -> Result<CycleOutcome, CoordinatorError> {
        self.state = CycleState::Fetching;
        let budget = self.settings.fetch_timeout;
        let station = self.station_id.as_str();

        debug!("Fetching forecast, observation and alert feeds");
        let (forecast, observation, alerts) = tokio::join!(
            fetch_within(&self.forecast_client, station, budget),
            fetch_within(&self.observation_client, station, budget),
            fetch_within(&self.alert_client, &self.settings.alert_region, budget),
        );

        record(&mut self.feeds.forecast, "forecast", &forecast, now);
        record(&mut self.feeds.observation, "observation", &observation, now);
        record(&mut self.feeds.alerts, "alerts", &alerts, now);
        self.status_publisher.send_replace(self.feeds.clone());

        let previous = self.publisher.borrow().clone();

        if forecast.is_err() && observation.is_err() && alerts.is_err() {
            self.state = CycleState::TotalFailure;
            return match previous {
                Some(prior) => {
                    warn!("All feeds failed, keeping previous snapshot");
                    self.expire_retained_alerts(&prior, now);
                    self.state = CycleState::Retained;
                    Ok(CycleOutcome::Retained)
                }
                None => {
                    error!("All feeds failed and no earlier snapshot exists");
                    Err(CoordinatorError::NoDataAvailable(self.station_id.clone()))
                }
            };
        }

        let (series, forecast_failed) = match forecast {
            Ok(points) => (build_series(points, now, self.settings.utc_offset), false),
            Err(_) => match previous.as_deref() {
                Some(prior) => {
                    warn!("Forecast unavailable, reusing series from {}", prior.forecast.fetched_at);
                    let mut series = prior.forecast.clone();
                    series.stale = true;
                    (series, true)
                }
                None => {
                    self.state = CycleState::TotalFailure;
                    error!("Forecast unavailable and no earlier snapshot exists");
                    return Err(CoordinatorError::NoDataAvailable(self.station_id.clone()));
                }
            },
        };

        self.state = if forecast_failed {
            CycleState::PartialFailure
        } else {
            CycleState::Merging
        };

        let interval = chrono_interval(self.settings.refresh_interval);
        let observation = observation.ok();
        let current = merge_current(observation.as_ref(), &series, now, interval);
        let hourly = hourly_window(&series, now);

        let (alert_list, alert_warnings) = match alerts {
            Ok(raw) => {
                let processed = process_alerts(&raw, &self.settings.alert_language, now);
                (processed.alerts, processed.warnings)
            }
            Err(_) => match previous.as_deref() {
                Some(prior) => {
                    debug!("Keeping {} alerts from the previous cycle", prior.alerts.len());
                    (retain_active(&prior.alerts, now), prior.alert_warnings)
                }
                None => (Vec::new(), 0),
            },
        };

        // Only a reused forecast can be stale
        let degraded = forecast_failed;

        let snapshot = WeatherSnapshot {
            station_id: self.station_id.clone(),
            current,
            forecast: series,
            hourly,
            alerts: alert_list,
            created_at: now,
            degraded,
            feeds: self.feeds.clone(),
            alert_warnings,
        };

        info!(
            degraded,
            alerts = snapshot.alerts.len(),
            forecast_points = snapshot.forecast.points.len(),
            "Publishing weather snapshot"
        );
        self.publisher.send_replace(Some(Arc::new(snapshot)));
        self.state = CycleState::Published;

        Ok(CycleOutcome::Published { degraded })
    }

    /// Drops alerts that ran out while every feed was failing. The rest of
    /// the retained snapshot, including its timestamp, is left untouched.
    fn expire_retained_alerts(&self, prior: &Arc<WeatherSnapshot>, now: DateTime<Utc>) {
        let alerts = retain_active(&prior.alerts, now);
        if alerts.len() == prior.alerts.len() {
            return;
        }

        info!(
            expired = prior.alerts.len() - alerts.len(),
            "Removing expired alerts from retained snapshot"
        );
        let mut snapshot = prior.as_ref().clone();
        snapshot.alerts = alerts;
        self.publisher.send_replace(Some(Arc::new(snapshot)));
    }
}

fn record<T>(status: &mut FeedStatus, feed: &str, result: &Result<T, FetchError>, now: DateTime<Utc>) {
    match result {
        Ok(_) => {
            status.last_success = Some(now);
            status.last_error = None;
        }
        Err(e) => {
            match e.kind() {
                FetchErrorKind::EmptyResult => debug!("{} feed returned no data: {}", feed, e),
                _ => warn!("{} feed failed: {}", feed, e),
            }
            status.last_error = Some(e.to_string());
        }
    }
}

fn chrono_interval(interval: Duration) -> chrono::Duration {
    chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::minutes(10))
}
