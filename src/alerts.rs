//! Turns the raw alert feed into the ordered list of active alerts.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, warn};

use crate::models::{Alert, RawAlert, Severity};

/// Reasons a single alert entry is skipped
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AlertEntryError {
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error("invalid {field} timestamp '{value}'")]
    InvalidTimestamp { field: &'static str, value: String },
    #[error("effective window ends before it starts")]
    InvertedWindow,
}

/// Result of one alert processing pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessedAlerts {
    pub alerts: Vec<Alert>,
    /// Malformed entries that were skipped
    pub warnings: usize,
}

/// Filters, deduplicates and orders the raw alert entries.
///
/// Entries in other languages are dropped. A malformed entry is skipped and
/// counted without affecting the rest of the batch. When several entries
/// share an identifier only the most recently issued one is kept, and only
/// then is the expiry window checked, so a correction that ends an alert
/// early removes it.
pub fn process_alerts(raw: &[RawAlert], language: &str, now: DateTime<Utc>) -> ProcessedAlerts {
    let mut warnings = 0;
    let mut candidates = Vec::new();

    for entry in raw {
        let Some(entry_language) = entry.language.as_deref() else {
            warn!(
                "Skipping alert {:?}: {}",
                entry.identifier,
                AlertEntryError::MissingField("language")
            );
            warnings += 1;
            continue;
        };
        if !language_matches(entry_language, language) {
            continue;
        }

        match validate(entry) {
            Ok(alert) => candidates.push(alert),
            Err(e) => {
                warn!("Skipping alert {:?}: {}", entry.identifier, e);
                warnings += 1;
            }
        }
    }

    if warnings > 0 {
        warn!("Skipped {} malformed alert entries out of {}", warnings, raw.len());
    }

    let latest = supersede(candidates);
    let alerts = active_in_order(latest, now);
    debug!("{} active alerts after processing {} entries", alerts.len(), raw.len());

    ProcessedAlerts { alerts, warnings }
}

/// Re-applies the expiry window to a previously processed list
pub fn retain_active(alerts: &[Alert], now: DateTime<Utc>) -> Vec<Alert> {
    active_in_order(alerts.to_vec(), now)
}

/// `is-IS` matches a configured `is`; comparison ignores case
pub fn language_matches(entry_language: &str, configured: &str) -> bool {
    let entry_language = entry_language.trim().to_lowercase();
    let configured = configured.trim().to_lowercase();
    !configured.is_empty() && entry_language.starts_with(&configured)
}

fn validate(entry: &RawAlert) -> Result<Alert, AlertEntryError> {
    let id = entry
        .identifier
        .clone()
        .ok_or(AlertEntryError::MissingField("identifier"))?;
    let headline = entry
        .headline
        .clone()
        .or_else(|| entry.event.clone())
        .ok_or(AlertEntryError::MissingField("headline"))?;
    let effective_from = required_time("effective-from", entry.effective_from.as_deref())?;
    let effective_until = required_time("effective-until", entry.effective_until.as_deref())?;
    let issued_at = required_time("issued-at", entry.issued_at.as_deref())?;

    if effective_from > effective_until {
        return Err(AlertEntryError::InvertedWindow);
    }

    Ok(Alert {
        id,
        headline,
        description: entry.description.clone().unwrap_or_default(),
        event: entry.event.clone(),
        severity: entry
            .severity
            .as_deref()
            .map(Severity::from_cap)
            .unwrap_or(Severity::Unknown),
        language: entry.language.clone().unwrap_or_default(),
        effective_from,
        effective_until,
        issued_at,
        area: entry.area.clone(),
        link: entry.link.clone(),
    })
}

fn required_time(field: &'static str, value: Option<&str>) -> Result<DateTime<Utc>, AlertEntryError> {
    let value = value.ok_or(AlertEntryError::MissingField(field))?;
    parse_alert_time(value).ok_or_else(|| AlertEntryError::InvalidTimestamp {
        field,
        value: value.to_string(),
    })
}

/// RFC 3339 as used by CAP, or a bare `YYYY-MM-DD HH:MM:SS` taken as UTC
fn parse_alert_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    // CAP writes UTC as "-00:00"
    let normalized = match value.strip_suffix("-00:00") {
        Some(prefix) => format!("{}+00:00", prefix),
        None => value.to_string(),
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

/// Keeps the most recently issued version of each identifier; an equal
/// issue time goes to the entry seen last.
fn supersede(candidates: Vec<Alert>) -> Vec<Alert> {
    let total = candidates.len();
    let mut order: Vec<String> = Vec::new();
    let mut latest: HashMap<String, Alert> = HashMap::new();

    for alert in candidates {
        match latest.get(&alert.id) {
            Some(existing) if existing.issued_at > alert.issued_at => {}
            Some(_) => {
                latest.insert(alert.id.clone(), alert);
            }
            None => {
                order.push(alert.id.clone());
                latest.insert(alert.id.clone(), alert);
            }
        }
    }

    if latest.len() < total {
        debug!("Collapsed {} superseded alert versions", total - latest.len());
    }
    order.into_iter().filter_map(|id| latest.remove(&id)).collect()
}

/// Drops alerts outside their window, then orders most severe first and
/// earliest starting first within a severity.
fn active_in_order(alerts: Vec<Alert>, now: DateTime<Utc>) -> Vec<Alert> {
    let mut active: Vec<Alert> = alerts.into_iter().filter(|a| a.is_active_at(now)).collect();
    active.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then(a.effective_from.cmp(&b.effective_from))
            .then_with(|| a.id.cmp(&b.id))
    });
    active
}
