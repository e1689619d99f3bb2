use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::coordinator::SnapshotReader;
use crate::models::{
    highest_severity, Alert, CurrentConditions, DailyForecast, FeedStatuses, HourlyForecast,
    Severity, WeatherSnapshot,
};

#[derive(Clone)]
pub struct AppState {
    pub station_name: String,
    pub reader: SnapshotReader,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub has_snapshot: bool,
    pub degraded: Option<bool>,
    pub last_updated: Option<DateTime<Utc>>,
    pub feeds: FeedStatuses,
}

#[derive(Serialize)]
pub struct CurrentResponse {
    pub station_id: String,
    pub station_name: String,
    pub last_updated: DateTime<Utc>,
    pub degraded: bool,
    pub current: CurrentConditions,
}

#[derive(Serialize)]
pub struct HourlyResponse {
    pub last_updated: DateTime<Utc>,
    pub stale: bool,
    pub hourly: Vec<HourlyForecast>,
}

#[derive(Serialize)]
pub struct DailyResponse {
    pub last_updated: DateTime<Utc>,
    pub stale: bool,
    pub daily: Vec<DailyForecast>,
}

#[derive(Serialize)]
pub struct AlertsResponse {
    pub last_updated: DateTime<Utc>,
    pub count: usize,
    pub highest_severity: Option<Severity>,
    pub alerts: Vec<Alert>,
}

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/weather", get(get_snapshot))
        .route("/weather/current", get(get_current))
        .route("/weather/forecast/hourly", get(get_hourly))
        .route("/weather/forecast/daily", get(get_daily))
        .route("/weather/alerts", get(get_alerts))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}

fn require_snapshot(state: &AppState) -> Result<Arc<WeatherSnapshot>, StatusCode> {
    state.reader.snapshot().ok_or_else(|| {
        warn!("No weather snapshot has been published yet");
        StatusCode::SERVICE_UNAVAILABLE
    })
}

#[instrument(skip(state))]
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    debug!("Health check requested");
    let snapshot = state.reader.snapshot();
    let response = HealthResponse {
        status: "healthy".to_string(),
        has_snapshot: snapshot.is_some(),
        degraded: snapshot.as_ref().map(|s| s.is_degraded()),
        last_updated: snapshot.as_ref().map(|s| s.last_updated()),
        feeds: state.reader.feed_statuses(),
    };
    (StatusCode::OK, Json(response))
}

#[instrument(skip(state))]
async fn get_snapshot(State(state): State<AppState>) -> Result<Json<WeatherSnapshot>, StatusCode> {
    let snapshot = require_snapshot(&state)?;
    info!("Serving snapshot from {}", snapshot.last_updated());
    let mut body = snapshot.as_ref().clone();
    body.alerts = snapshot.active_alerts_at(Utc::now());
    Ok(Json(body))
}

#[instrument(skip(state))]
async fn get_current(State(state): State<AppState>) -> Result<Json<CurrentResponse>, StatusCode> {
    let snapshot = require_snapshot(&state)?;
    debug!("Serving current conditions from {}", snapshot.last_updated());
    Ok(Json(CurrentResponse {
        station_id: snapshot.station_id.to_string(),
        station_name: state.station_name.clone(),
        last_updated: snapshot.last_updated(),
        degraded: snapshot.is_degraded(),
        current: snapshot.current().clone(),
    }))
}

#[instrument(skip(state))]
async fn get_hourly(State(state): State<AppState>) -> Result<Json<HourlyResponse>, StatusCode> {
    let snapshot = require_snapshot(&state)?;
    debug!("Serving {} hourly forecast entries", snapshot.hourly().len());
    Ok(Json(HourlyResponse {
        last_updated: snapshot.last_updated(),
        stale: snapshot.forecast().stale,
        hourly: snapshot.hourly().to_vec(),
    }))
}

#[instrument(skip(state))]
async fn get_daily(State(state): State<AppState>) -> Result<Json<DailyResponse>, StatusCode> {
    let snapshot = require_snapshot(&state)?;
    debug!("Serving {} daily forecast entries", snapshot.daily().len());
    Ok(Json(DailyResponse {
        last_updated: snapshot.last_updated(),
        stale: snapshot.forecast().stale,
        daily: snapshot.daily().to_vec(),
    }))
}

#[instrument(skip(state))]
async fn get_alerts(State(state): State<AppState>) -> Result<Json<AlertsResponse>, StatusCode> {
    let snapshot = require_snapshot(&state)?;
    let alerts = snapshot.active_alerts_at(Utc::now());
    info!("Serving {} active alerts", alerts.len());
    Ok(Json(AlertsResponse {
        last_updated: snapshot.last_updated(),
        count: alerts.len(),
        highest_severity: highest_severity(&alerts),
        alerts,
    }))
}
