use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::conditions::compass_bearing;
use crate::fetch_error::FetchError;
use crate::feeds::{
    child_f64, child_text, expand_url, find_descendant, get_text, parse_feed_time, parse_xml,
    station_is_valid, Feed, FeedClient,
};
use crate::models::RawObservation;

pub const DEFAULT_OBSERVATION_URL: &str =
    "https://xmlweather.vedur.is/?op_w=xml&type=obs&lang=en&view=xml&ids={station_id}";

/// Client for the station observation XML feed
#[derive(Clone)]
pub struct ObservationClient {
    client: reqwest::Client,
    url_template: String,
}

impl ObservationClient {
    pub fn new(url_template: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url_template,
        }
    }

    #[instrument(skip(self, xml), fields(xml_size = xml.len()))]
    pub fn parse_observation(&self, station_id: &str, xml: &str) -> Result<RawObservation, FetchError> {
        let root = parse_xml(xml)?;
        let station = find_descendant(&root, "station")
            .ok_or_else(|| FetchError::MalformedPayload("no <station> element".to_string()))?;

        if !station_is_valid(station) {
            debug!("Station {} has no observation data", station_id);
            return Err(FetchError::EmptyResult(station_id.to_string()));
        }

        // Stations without sensors report an empty record with no time
        let time = child_text(station, "time");

        let observation = RawObservation {
            observed_at: Default::default(),
            temperature: child_f64(station, "T"),
            humidity: child_f64(station, "RH"),
            pressure: child_f64(station, "P"),
            wind_speed: child_f64(station, "F"),
            wind_gust: child_f64(station, "FG"),
            wind_direction: child_text(station, "D").as_deref().and_then(compass_bearing),
            precipitation: child_f64(station, "R"),
            cloud_cover: child_f64(station, "N"),
            dew_point: child_f64(station, "TD"),
            visibility: child_f64(station, "V"),
            condition_text: child_text(station, "W"),
        };

        if observation.is_empty() {
            return Err(FetchError::EmptyResult(station_id.to_string()));
        }

        let time = time.ok_or_else(|| {
            FetchError::MalformedPayload("observation has readings but no <time>".to_string())
        })?;

        Ok(RawObservation {
            observed_at: parse_feed_time(&time)?,
            ..observation
        })
    }
}

#[async_trait]
impl FeedClient for ObservationClient {
    type Payload = RawObservation;

    fn feed(&self) -> Feed {
        Feed::Observation
    }

    #[instrument(skip(self), fields(feed = "observation"))]
    async fn fetch(&self, station_id: &str) -> Result<RawObservation, FetchError> {
        let url = expand_url(&self.url_template, "station_id", station_id);
        debug!("Requesting observation from {}", url);
        let xml = get_text(&self.client, &url).await?;
        debug!("Retrieved observation XML, size: {} bytes", xml.len());
        self.parse_observation(station_id, &xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ObservationClient {
        ObservationClient::new(DEFAULT_OBSERVATION_URL.to_string())
    }

    #[test]
    fn test_parse_observation() {
        let xml = r#"<observations>
          <station id="1" valid="1">
            <name>Reykjavík</name>
            <time>2025-01-10 12:00:00</time>
            <err></err>
            <F>4</F><FX>6</FX><FG>9</FG><D>NA</D><T>5,2</T><W>Skýjað</W>
            <V>40</V><N>88</N><P>1003</P><RH>81</RH><TD>2.1</TD><R></R>
          </station>
        </observations>"#;

        let obs = client().parse_observation("1", xml).unwrap();
        assert_eq!(obs.observed_at.to_rfc3339(), "2025-01-10T12:00:00+00:00");
        assert_eq!(obs.temperature, Some(5.2));
        assert_eq!(obs.wind_speed, Some(4.0));
        assert_eq!(obs.wind_gust, Some(9.0));
        assert_eq!(obs.wind_direction, Some(45.0));
        assert_eq!(obs.humidity, Some(81.0));
        assert_eq!(obs.pressure, Some(1003.0));
        assert_eq!(obs.cloud_cover, Some(88.0));
        assert_eq!(obs.dew_point, Some(2.1));
        assert_eq!(obs.visibility, Some(40.0));
        assert_eq!(obs.condition_text.as_deref(), Some("Skýjað"));
        // Empty element is absent, not zero
        assert_eq!(obs.precipitation, None);
    }

    #[test]
    fn test_parse_observation_partial_station() {
        let xml = r#"<observations><station id="31572" valid="1">
            <time>2025-01-10 12:00:00</time><T>-3.5</T><F>11</F>
        </station></observations>"#;

        let obs = client().parse_observation("31572", xml).unwrap();
        assert_eq!(obs.temperature, Some(-3.5));
        assert_eq!(obs.humidity, None);
        assert_eq!(obs.pressure, None);
        assert_eq!(obs.condition_text, None);
    }

    #[test]
    fn test_parse_observation_without_readings_is_empty() {
        let xml = r#"<observations><station id="1" valid="1"><name>X</name><time></time></station></observations>"#;
        assert!(matches!(
            client().parse_observation("1", xml),
            Err(FetchError::EmptyResult(_))
        ));
    }

    #[test]
    fn test_parse_observation_invalid_station_is_empty() {
        let xml = r#"<observations><station id="1" valid="0"><err>No data</err></station></observations>"#;
        assert!(matches!(
            client().parse_observation("1", xml),
            Err(FetchError::EmptyResult(_))
        ));
    }

    #[test]
    fn test_parse_observation_missing_time_is_malformed() {
        let xml = r#"<observations><station id="1" valid="1"><T>1</T></station></observations>"#;
        assert!(matches!(
            client().parse_observation("1", xml),
            Err(FetchError::MalformedPayload(_))
        ));
    }
}
