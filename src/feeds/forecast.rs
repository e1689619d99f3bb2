use async_trait::async_trait;
use tracing::{debug, instrument, warn};
use xmltree::Element;

use crate::conditions::{compass_bearing, Condition};
use crate::fetch_error::FetchError;
use crate::feeds::{
    child_f64, child_text, children, expand_url, find_descendant, get_text, parse_feed_time,
    parse_xml, station_is_valid, Feed, FeedClient,
};
use crate::models::RawForecastPoint;

pub const DEFAULT_FORECAST_URL: &str =
    "https://xmlweather.vedur.is/?op_w=xml&type=forec&lang=en&view=xml&ids={station_id}";

/// Client for the station forecast XML feed
#[derive(Clone)]
pub struct ForecastClient {
    client: reqwest::Client,
    url_template: String,
}

impl ForecastClient {
    pub fn new(url_template: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url_template,
        }
    }

    #[instrument(skip(self, xml), fields(xml_size = xml.len()))]
    pub fn parse_forecast(&self, station_id: &str, xml: &str) -> Result<Vec<RawForecastPoint>, FetchError> {
        let root = parse_xml(xml)?;
        let station = find_descendant(&root, "station")
            .ok_or_else(|| FetchError::MalformedPayload("no <station> element".to_string()))?;

        if !station_is_valid(station) {
            debug!("Station {} reported as invalid by forecast feed", station_id);
            return Err(FetchError::EmptyResult(station_id.to_string()));
        }

        let issued_at = match child_text(station, "atime") {
            Some(atime) => match parse_feed_time(&atime) {
                Ok(ts) => Some(ts),
                Err(e) => {
                    warn!("Ignoring unparseable forecast issue time: {}", e);
                    None
                }
            },
            None => None,
        };

        let entries: Vec<&Element> = children(station, "forecast").collect();
        if entries.is_empty() {
            return Err(FetchError::EmptyResult(station_id.to_string()));
        }

        let mut points = Vec::with_capacity(entries.len());
        let mut skipped = 0;
        for (idx, entry) in entries.iter().enumerate() {
            match parse_point(entry, issued_at) {
                Ok(point) => points.push(point),
                Err(e) => {
                    warn!("Skipping forecast entry {}: {}", idx, e);
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            warn!("Skipped {} unparseable forecast entries out of {}", skipped, entries.len());
        }
        if points.is_empty() {
            return Err(FetchError::MalformedPayload(format!(
                "none of {} forecast entries could be parsed",
                entries.len()
            )));
        }

        debug!("Parsed {} forecast points", points.len());
        Ok(points)
    }
}

fn parse_point(
    entry: &Element,
    issued_at: Option<chrono::DateTime<chrono::Utc>>,
) -> Result<RawForecastPoint, FetchError> {
    let ftime = child_text(entry, "ftime")
        .ok_or_else(|| FetchError::MalformedPayload("missing <ftime>".to_string()))?;
    let timestamp = parse_feed_time(&ftime)?;
    let temperature = child_f64(entry, "T")
        .ok_or_else(|| FetchError::MalformedPayload(format!("missing temperature at {}", ftime)))?;
    let wind_speed = child_f64(entry, "F")
        .ok_or_else(|| FetchError::MalformedPayload(format!("missing wind speed at {}", ftime)))?;
    let condition_text = child_text(entry, "W");

    Ok(RawForecastPoint {
        timestamp,
        issued_at,
        temperature,
        wind_speed,
        wind_direction: child_text(entry, "D").as_deref().and_then(compass_bearing),
        condition: Condition::from_text(condition_text.as_deref()),
        condition_text,
    })
}

#[async_trait]
impl FeedClient for ForecastClient {
    type Payload = Vec<RawForecastPoint>;

    fn feed(&self) -> Feed {
        Feed::Forecast
    }

    #[instrument(skip(self), fields(feed = "forecast"))]
    async fn fetch(&self, station_id: &str) -> Result<Vec<RawForecastPoint>, FetchError> {
        let url = expand_url(&self.url_template, "station_id", station_id);
        debug!("Requesting forecast from {}", url);
        let xml = get_text(&self.client, &url).await?;
        debug!("Retrieved forecast XML, size: {} bytes", xml.len());
        self.parse_forecast(station_id, &xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ForecastClient {
        ForecastClient::new(DEFAULT_FORECAST_URL.to_string())
    }

    const FORECAST_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<forecasts>
  <station id="1" valid="1">
    <name>Reykjavík</name>
    <atime>2025-01-10 06:00:00</atime>
    <err></err>
    <forecast>
      <ftime>2025-01-10 12:00:00</ftime>
      <F>3</F><D>S</D><T>4</T><W>Cloudy</W>
    </forecast>
    <forecast>
      <ftime>2025-01-10 13:00:00</ftime>
      <F>5</F><D>Logn</D><T>-1</T><W>Light snow</W>
    </forecast>
  </station>
</forecasts>"#;

    #[test]
    fn test_parse_forecast() {
        let points = client().parse_forecast("1", FORECAST_XML).unwrap();
        assert_eq!(points.len(), 2);

        assert_eq!(points[0].temperature, 4.0);
        assert_eq!(points[0].wind_speed, 3.0);
        assert_eq!(points[0].wind_direction, Some(180.0));
        assert_eq!(points[0].condition, Condition::Cloudy);
        assert_eq!(
            points[0].issued_at.unwrap().to_rfc3339(),
            "2025-01-10T06:00:00+00:00"
        );

        // Calm has no bearing
        assert_eq!(points[1].wind_direction, None);
        assert_eq!(points[1].condition, Condition::Snowy);
    }

    #[test]
    fn test_parse_forecast_skips_incomplete_entries() {
        let xml = r#"<forecasts><station id="1" valid="1">
            <forecast><ftime>2025-01-10 12:00:00</ftime><F>3</F><T></T></forecast>
            <forecast><ftime>bad</ftime><F>3</F><T>1</T></forecast>
            <forecast><ftime>2025-01-10 14:00:00</ftime><F>2</F><T>1</T></forecast>
        </station></forecasts>"#;
        let points = client().parse_forecast("1", xml).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].temperature, 1.0);
        assert_eq!(points[0].issued_at, None);
    }

    #[test]
    fn test_parse_forecast_invalid_station_is_empty() {
        let xml = r#"<forecasts><station id="999" valid="0"><err>Station not found</err></station></forecasts>"#;
        let result = client().parse_forecast("999", xml);
        assert!(matches!(result, Err(FetchError::EmptyResult(id)) if id == "999"));
    }

    #[test]
    fn test_parse_forecast_without_entries_is_empty() {
        let xml = r#"<forecasts><station id="1" valid="1"><name>X</name></station></forecasts>"#;
        assert!(matches!(
            client().parse_forecast("1", xml),
            Err(FetchError::EmptyResult(_))
        ));
    }

    #[test]
    fn test_parse_forecast_all_entries_broken_is_malformed() {
        let xml = r#"<forecasts><station id="1" valid="1">
            <forecast><ftime>2025-01-10 12:00:00</ftime></forecast>
        </station></forecasts>"#;
        assert!(matches!(
            client().parse_forecast("1", xml),
            Err(FetchError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_parse_forecast_not_xml() {
        assert!(matches!(
            client().parse_forecast("1", "<html><body>oops"),
            Err(FetchError::MalformedPayload(_))
        ));
        assert!(matches!(
            client().parse_forecast("1", "<forecasts/>"),
            Err(FetchError::MalformedPayload(_))
        ));
    }
}
