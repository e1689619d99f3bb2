// Shared fixtures for the coordinator and API tests.
// Feed clients here replay scripted results instead of touching the network.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use weather_aggregator::conditions::Condition;
use weather_aggregator::coordinator::{Coordinator, CoordinatorSettings};
use weather_aggregator::fetch_error::FetchError;
use weather_aggregator::feeds::{Feed, FeedClient};
use weather_aggregator::models::{RawAlert, RawForecastPoint, RawObservation, StationId};

pub const STATION: &str = "1";

/// One scripted response, optionally delayed
struct Step<T> {
    delay: Duration,
    result: Result<T, FetchError>,
}

/// Feed client that replays queued results in order.
///
/// Once the script runs out every further fetch fails with a network error.
#[derive(Clone)]
pub struct ScriptedClient<T> {
    feed: Feed,
    steps: Arc<Mutex<VecDeque<Step<T>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl<T> ScriptedClient<T> {
    pub fn new(feed: Feed) -> Self {
        Self {
            feed,
            steps: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push_ok(&self, value: T) -> &Self {
        self.push(Duration::ZERO, Ok(value))
    }

    pub fn push_err(&self, error: FetchError) -> &Self {
        self.push(Duration::ZERO, Err(error))
    }

    pub fn push_delayed(&self, delay: Duration, result: Result<T, FetchError>) -> &Self {
        self.push(delay, result)
    }

    fn push(&self, delay: Duration, result: Result<T, FetchError>) -> &Self {
        self.steps.lock().unwrap().push_back(Step { delay, result });
        self
    }

    /// Keys the client was asked for, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl<T: Send + 'static> FeedClient for ScriptedClient<T> {
    type Payload = T;

    fn feed(&self) -> Feed {
        self.feed
    }

    async fn fetch(&self, key: &str) -> Result<T, FetchError> {
        self.calls.lock().unwrap().push(key.to_string());
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(step) => {
                if !step.delay.is_zero() {
                    tokio::time::sleep(step.delay).await;
                }
                step.result
            }
            None => Err(FetchError::MalformedPayload("script exhausted".to_string())),
        }
    }
}

pub type TestCoordinator = Coordinator<
    ScriptedClient<Vec<RawForecastPoint>>,
    ScriptedClient<RawObservation>,
    ScriptedClient<Vec<RawAlert>>,
>;

pub struct Harness {
    pub forecast: ScriptedClient<Vec<RawForecastPoint>>,
    pub observation: ScriptedClient<RawObservation>,
    pub alerts: ScriptedClient<Vec<RawAlert>>,
    pub coordinator: TestCoordinator,
}

pub fn harness() -> Harness {
    harness_with(CoordinatorSettings::default())
}

pub fn harness_with(settings: CoordinatorSettings) -> Harness {
    let forecast = ScriptedClient::new(Feed::Forecast);
    let observation = ScriptedClient::new(Feed::Observation);
    let alerts = ScriptedClient::new(Feed::Alerts);
    let coordinator = Coordinator::new(
        StationId::new(STATION),
        settings,
        forecast.clone(),
        observation.clone(),
        alerts.clone(),
    );
    Harness {
        forecast,
        observation,
        alerts,
        coordinator,
    }
}

/// Fixed reference instant used across tests: 2025-01-10 12:00 UTC
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap()
}

pub fn hours(n: i64) -> chrono::Duration {
    chrono::Duration::hours(n)
}

pub fn network_error() -> FetchError {
    FetchError::Timeout(Duration::from_secs(20))
}

pub fn forecast_point(at: DateTime<Utc>, temperature: f64, wind_speed: f64) -> RawForecastPoint {
    RawForecastPoint {
        timestamp: at,
        issued_at: Some(base_time() - hours(6)),
        temperature,
        wind_speed,
        wind_direction: Some(90.0),
        condition: Condition::Cloudy,
        condition_text: Some("Overcast".to_string()),
    }
}

/// Hourly points from `start` for `count` hours at a constant temperature
pub fn forecast_points(start: DateTime<Utc>, count: i64, temperature: f64) -> Vec<RawForecastPoint> {
    (0..count)
        .map(|h| forecast_point(start + hours(h), temperature, 5.0))
        .collect()
}

pub fn observation(at: DateTime<Utc>, temperature: f64, wind_speed: f64) -> RawObservation {
    RawObservation {
        observed_at: at,
        temperature: Some(temperature),
        humidity: Some(85.0),
        pressure: Some(1002.0),
        wind_speed: Some(wind_speed),
        wind_direction: Some(180.0),
        condition_text: Some("Light rain".to_string()),
        ..RawObservation::default()
    }
}

pub fn raw_alert(
    id: &str,
    severity: &str,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
    issued: DateTime<Utc>,
) -> RawAlert {
    RawAlert {
        identifier: Some(id.to_string()),
        language: Some("is-IS".to_string()),
        severity: Some(severity.to_string()),
        event: Some("Wind".to_string()),
        headline: Some(format!("{} warning {}", severity, id)),
        description: Some("Strong winds expected".to_string()),
        effective_from: Some(from.to_rfc3339()),
        effective_until: Some(until.to_rfc3339()),
        issued_at: Some(issued.to_rfc3339()),
        area: Some("Faxaflói".to_string()),
        link: None,
    }
}
