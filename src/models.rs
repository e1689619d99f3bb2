use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::conditions::Condition;

/// Identifier of the single station a coordinator serves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationId(String);

impl StationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which upstream supplied a merged value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Observation,
    Forecast,
    Derived,
    Unavailable,
}

/// A merged value tagged with its source.
///
/// Absence is a variant of its own so a missing reading can never leak into
/// arithmetic as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "value", rename_all = "snake_case")]
pub enum Field<T> {
    Observation(T),
    Forecast(T),
    Derived(T),
    Unavailable,
}

impl<T> Field<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Field::Observation(v) | Field::Forecast(v) | Field::Derived(v) => Some(v),
            Field::Unavailable => None,
        }
    }

    pub fn source(&self) -> Source {
        match self {
            Field::Observation(_) => Source::Observation,
            Field::Forecast(_) => Source::Forecast,
            Field::Derived(_) => Source::Derived,
            Field::Unavailable => Source::Unavailable,
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Field::Unavailable)
    }
}

impl<T: Copy> Field<T> {
    pub fn get(&self) -> Option<T> {
        self.value().copied()
    }
}

/// One observation record. Every reading is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub observed_at: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_gust: Option<f64>,
    pub wind_direction: Option<f64>,
    pub precipitation: Option<f64>,
    pub cloud_cover: Option<f64>,
    pub dew_point: Option<f64>,
    pub visibility: Option<f64>,
    pub condition_text: Option<String>,
}

impl RawObservation {
    /// True when the station reported no readings at all
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.humidity.is_none()
            && self.pressure.is_none()
            && self.wind_speed.is_none()
            && self.wind_gust.is_none()
            && self.wind_direction.is_none()
            && self.precipitation.is_none()
            && self.cloud_cover.is_none()
            && self.dew_point.is_none()
            && self.visibility.is_none()
            && self.condition_text.is_none()
    }
}

/// One forecast instant (°C, m/s, degrees).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawForecastPoint {
    pub timestamp: DateTime<Utc>,
    /// Issue time of the forecast run this point came from
    pub issued_at: Option<DateTime<Utc>>,
    pub temperature: f64,
    pub wind_speed: f64,
    /// None for calm or an unrecognised compass code
    pub wind_direction: Option<f64>,
    pub condition: Condition,
    pub condition_text: Option<String>,
}

/// Hourly forecast entry as exposed to consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub apparent_temperature: f64,
    pub wind_speed: f64,
    pub wind_direction: Option<f64>,
    pub condition: Condition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    /// Calendar day in station-local time
    pub date: NaiveDate,
    pub temperature_high: f64,
    pub temperature_low: f64,
    pub condition: Condition,
    pub wind_speed_mean: f64,
}

/// Chronological, timestamp-deduplicated forecast points plus the daily
/// aggregation derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub points: Vec<RawForecastPoint>,
    pub daily: Vec<DailyForecast>,
    /// When the forecast feed last returned this data
    pub fetched_at: DateTime<Utc>,
    /// Set when reused from an earlier cycle after a failed forecast fetch
    pub stale: bool,
}

/// The merged "now" view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature: Field<f64>,
    pub feels_like: Field<f64>,
    pub wind_speed: Field<f64>,
    pub wind_direction: Field<f64>,
    pub condition: Field<Condition>,
    pub condition_text: Field<String>,
    pub humidity: Field<f64>,
    pub pressure: Field<f64>,
    pub wind_gust: Field<f64>,
    pub precipitation: Field<f64>,
    pub cloud_cover: Field<f64>,
    pub dew_point: Field<f64>,
    pub visibility: Field<f64>,
    pub observed_at: Option<DateTime<Utc>>,
    /// Timestamp of the forecast point used for fallbacks
    pub forecast_time: Option<DateTime<Utc>>,
}

/// Alert colour, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Unknown,
    Yellow,
    Orange,
    Red,
}

impl Severity {
    /// Accepts CAP severities (`Extreme`, `Severe`, `Moderate`, `Minor`) as
    /// well as colour names.
    pub fn from_cap(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "extreme" | "red" => Severity::Red,
            "severe" | "orange" => Severity::Orange,
            "moderate" | "minor" | "yellow" => Severity::Yellow,
            _ => Severity::Unknown,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Unknown => "unknown",
            Severity::Yellow => "yellow",
            Severity::Orange => "orange",
            Severity::Red => "red",
        };
        f.write_str(name)
    }
}

/// One alert entry as delivered by the alert feed, before validation.
/// There is one entry per language translation of a hazard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAlert {
    pub identifier: Option<String>,
    pub language: Option<String>,
    pub severity: Option<String>,
    pub event: Option<String>,
    pub headline: Option<String>,
    pub description: Option<String>,
    pub effective_from: Option<String>,
    pub effective_until: Option<String>,
    pub issued_at: Option<String>,
    pub area: Option<String>,
    pub link: Option<String>,
}

/// A validated alert; `effective_from <= effective_until` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub headline: String,
    pub description: String,
    pub event: Option<String>,
    pub severity: Severity,
    pub language: String,
    pub effective_from: DateTime<Utc>,
    pub effective_until: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
    pub area: Option<String>,
    pub link: Option<String>,
}

impl Alert {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.effective_from <= now && now <= self.effective_until
    }
}

/// Most severe colour among the alerts, if any
pub fn highest_severity(alerts: &[Alert]) -> Option<Severity> {
    alerts.iter().map(|a| a.severity).max()
}

/// Outcome history of one feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedStatus {
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedStatuses {
    pub forecast: FeedStatus,
    pub observation: FeedStatus,
    pub alerts: FeedStatus,
}

/// One immutable, fully merged view of a station as of one refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub station_id: StationId,
    pub current: CurrentConditions,
    pub forecast: ForecastSeries,
    pub hourly: Vec<HourlyForecast>,
    pub alerts: Vec<Alert>,
    pub created_at: DateTime<Utc>,
    pub degraded: bool,
    pub feeds: FeedStatuses,
    /// Alert entries skipped as malformed in the cycle that produced the list
    pub alert_warnings: usize,
}

impl WeatherSnapshot {
    pub fn current(&self) -> &CurrentConditions {
        &self.current
    }

    pub fn forecast(&self) -> &ForecastSeries {
        &self.forecast
    }

    pub fn hourly(&self) -> &[HourlyForecast] {
        &self.hourly
    }

    pub fn daily(&self) -> &[DailyForecast] {
        &self.forecast.daily
    }

    /// Alerts that were active when the snapshot was built
    pub fn active_alerts(&self) -> &[Alert] {
        &self.alerts
    }

    /// Alerts still inside their effective window at `now`
    pub fn active_alerts_at(&self, now: DateTime<Utc>) -> Vec<Alert> {
        self.alerts
            .iter()
            .filter(|alert| alert.is_active_at(now))
            .cloned()
            .collect()
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn highest_alert_severity(&self) -> Option<Severity> {
        highest_severity(&self.alerts)
    }

    pub fn highest_alert_severity_at(&self, now: DateTime<Utc>) -> Option<Severity> {
        highest_severity(&self.active_alerts_at(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_unavailable_has_no_value() {
        let field: Field<f64> = Field::Unavailable;
        assert_eq!(field.get(), None);
        assert_eq!(field.source(), Source::Unavailable);
        assert!(!field.is_available());
    }

    #[test]
    fn test_field_serializes_with_source_tag() {
        let json = serde_json::to_value(Field::Observation(5.0)).unwrap();
        assert_eq!(json["source"], "observation");
        assert_eq!(json["value"], 5.0);

        let json = serde_json::to_value(Field::<f64>::Unavailable).unwrap();
        assert_eq!(json["source"], "unavailable");
        assert!(json.get("value").is_none());
    }

    #[test]
    fn test_severity_from_cap() {
        assert_eq!(Severity::from_cap("Extreme"), Severity::Red);
        assert_eq!(Severity::from_cap("Severe"), Severity::Orange);
        assert_eq!(Severity::from_cap("Moderate"), Severity::Yellow);
        assert_eq!(Severity::from_cap("minor"), Severity::Yellow);
        assert_eq!(Severity::from_cap("orange"), Severity::Orange);
        assert_eq!(Severity::from_cap("whatever"), Severity::Unknown);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Red > Severity::Orange);
        assert!(Severity::Orange > Severity::Yellow);
        assert!(Severity::Yellow > Severity::Unknown);
    }

    #[test]
    fn test_highest_severity_empty() {
        assert_eq!(highest_severity(&[]), None);
    }
}
