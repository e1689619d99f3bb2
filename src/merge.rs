//! Combines the observation and forecast feeds into one view of "now".

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use tracing::debug;

use crate::conditions::Condition;
use crate::derived::{feels_like, feels_like_field};
use crate::models::{
    CurrentConditions, DailyForecast, Field, ForecastSeries, HourlyForecast, RawForecastPoint,
    RawObservation,
};

/// How far ahead the hourly window reaches
pub const HOURLY_WINDOW_HOURS: i64 = 48;
/// How far back the hourly window keeps the point covering "now"
pub const HOURLY_LOOKBACK_HOURS: i64 = 1;

/// Orders points chronologically and keeps one point per timestamp.
///
/// On a collision the point with the later issue time wins; with equal (or
/// missing) issue times the one delivered last wins.
pub fn build_series(
    points: Vec<RawForecastPoint>,
    fetched_at: DateTime<Utc>,
    utc_offset: FixedOffset,
) -> ForecastSeries {
    let total = points.len();
    let mut by_time: BTreeMap<DateTime<Utc>, RawForecastPoint> = BTreeMap::new();

    for point in points {
        match by_time.get(&point.timestamp) {
            Some(existing) if existing.issued_at > point.issued_at => {}
            _ => {
                by_time.insert(point.timestamp, point);
            }
        }
    }

    let points: Vec<RawForecastPoint> = by_time.into_values().collect();
    if points.len() < total {
        debug!(
            "Dropped {} forecast points with duplicate timestamps",
            total - points.len()
        );
    }

    let daily = aggregate_daily(&points, utc_offset);
    ForecastSeries {
        points,
        daily,
        fetched_at,
        stale: false,
    }
}

/// Daily high/low per calendar day in station-local time
pub fn aggregate_daily(points: &[RawForecastPoint], utc_offset: FixedOffset) -> Vec<DailyForecast> {
    let mut by_day: BTreeMap<NaiveDate, Vec<&RawForecastPoint>> = BTreeMap::new();
    for point in points {
        let day = point.timestamp.with_timezone(&utc_offset).date_naive();
        by_day.entry(day).or_default().push(point);
    }

    by_day
        .into_iter()
        .map(|(date, entries)| {
            let high = entries
                .iter()
                .map(|p| p.temperature)
                .fold(f64::NEG_INFINITY, f64::max);
            let low = entries
                .iter()
                .map(|p| p.temperature)
                .fold(f64::INFINITY, f64::min);
            let wind_total: f64 = entries.iter().map(|p| p.wind_speed).sum();
            let wind_mean = (wind_total / entries.len() as f64 * 10.0).round() / 10.0;

            DailyForecast {
                date,
                temperature_high: high,
                temperature_low: low,
                condition: dominant_condition(&entries),
                wind_speed_mean: wind_mean,
            }
        })
        .collect()
}

/// Most frequent condition; ties go to the one seen first
fn dominant_condition(entries: &[&RawForecastPoint]) -> Condition {
    let mut counts: HashMap<Condition, usize> = HashMap::new();
    for entry in entries {
        *counts.entry(entry.condition).or_default() += 1;
    }

    let mut best: Option<(Condition, usize)> = None;
    for entry in entries {
        let count = counts[&entry.condition];
        if best.map(|(_, c)| count > c).unwrap_or(true) {
            best = Some((entry.condition, count));
        }
    }
    best.map(|(condition, _)| condition).unwrap_or(Condition::Cloudy)
}

/// The forecast point closest to `now`; earlier point wins a tie
pub fn nearest_point(series: &ForecastSeries, now: DateTime<Utc>) -> Option<&RawForecastPoint> {
    series
        .points
        .iter()
        .min_by_key(|p| (p.timestamp - now).num_seconds().abs())
}

/// Points in `[now - 1h, now + 48h]` with their apparent temperature
pub fn hourly_window(series: &ForecastSeries, now: DateTime<Utc>) -> Vec<HourlyForecast> {
    let start = now - Duration::hours(HOURLY_LOOKBACK_HOURS);
    let end = now + Duration::hours(HOURLY_WINDOW_HOURS);

    series
        .points
        .iter()
        .filter(|p| p.timestamp >= start && p.timestamp <= end)
        .map(|p| HourlyForecast {
            timestamp: p.timestamp,
            temperature: p.temperature,
            apparent_temperature: feels_like(p.temperature, p.wind_speed),
            wind_speed: p.wind_speed,
            wind_direction: p.wind_direction,
            condition: p.condition,
        })
        .collect()
}

/// Whether an observation is recent enough to beat the forecast
pub fn observation_is_fresh(observation: &RawObservation, now: DateTime<Utc>, refresh_interval: Duration) -> bool {
    (now - observation.observed_at).num_seconds().abs() <= refresh_interval.num_seconds()
}

/// Builds the merged current conditions.
///
/// Per field: a fresh observation value wins, then the nearest forecast
/// point (temperature, wind speed, wind direction and condition only), else
/// the field is unavailable.
pub fn merge_current(
    observation: Option<&RawObservation>,
    series: &ForecastSeries,
    now: DateTime<Utc>,
    refresh_interval: Duration,
) -> CurrentConditions {
    let fresh = observation.filter(|obs| observation_is_fresh(obs, now, refresh_interval));
    if observation.is_some() && fresh.is_none() {
        debug!("Observation is older than one refresh interval, ignoring it");
    }
    let forecast = nearest_point(series, now);

    let observed = |pick: fn(&RawObservation) -> Option<f64>| -> Option<f64> { fresh.and_then(pick) };

    let temperature = with_fallback(observed(|o| o.temperature), forecast.map(|p| p.temperature));
    let wind_speed = with_fallback(observed(|o| o.wind_speed), forecast.map(|p| p.wind_speed));
    let wind_direction = with_fallback(
        observed(|o| o.wind_direction),
        forecast.and_then(|p| p.wind_direction),
    );

    let observed_text = fresh.and_then(|o| o.condition_text.clone());
    let (condition, condition_text) = match observed_text {
        Some(text) => (
            Field::Observation(Condition::from_text(Some(text.as_str()))),
            Field::Observation(text),
        ),
        None => (
            forecast.map_or(Field::Unavailable, |p| Field::Forecast(p.condition)),
            forecast
                .and_then(|p| p.condition_text.clone())
                .map_or(Field::Unavailable, Field::Forecast),
        ),
    };

    let apparent = feels_like_field(&temperature, &wind_speed);

    CurrentConditions {
        temperature,
        feels_like: apparent,
        wind_speed,
        wind_direction,
        condition,
        condition_text,
        humidity: observation_only(observed(|o| o.humidity)),
        pressure: observation_only(observed(|o| o.pressure)),
        wind_gust: observation_only(observed(|o| o.wind_gust)),
        precipitation: observation_only(observed(|o| o.precipitation)),
        cloud_cover: observation_only(observed(|o| o.cloud_cover)),
        dew_point: observation_only(observed(|o| o.dew_point)),
        visibility: observation_only(observed(|o| o.visibility)),
        observed_at: fresh.map(|o| o.observed_at),
        forecast_time: forecast.map(|p| p.timestamp),
    }
}

fn with_fallback<T>(observed: Option<T>, forecast: Option<T>) -> Field<T> {
    match (observed, forecast) {
        (Some(v), _) => Field::Observation(v),
        (None, Some(v)) => Field::Forecast(v),
        (None, None) => Field::Unavailable,
    }
}

fn observation_only<T>(observed: Option<T>) -> Field<T> {
    observed.map_or(Field::Unavailable, Field::Observation)
}
