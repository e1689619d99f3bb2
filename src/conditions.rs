use serde::{Deserialize, Serialize};

/// Coarse weather condition code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    #[serde(rename = "sunny")]
    Sunny,
    #[serde(rename = "partlycloudy")]
    PartlyCloudy,
    #[serde(rename = "cloudy")]
    Cloudy,
    #[serde(rename = "rainy")]
    Rainy,
    #[serde(rename = "snowy")]
    Snowy,
    #[serde(rename = "snowy-rainy")]
    SnowyRainy,
    #[serde(rename = "fog")]
    Fog,
    #[serde(rename = "lightning")]
    Lightning,
    #[serde(rename = "lightning-rainy")]
    LightningRainy,
}

// Keywords are matched against lowercased feed text; longest match wins so
// "light sleet" beats "sleet" and "thunderstorm" beats "thunder".
const CONDITION_KEYWORDS: &[(&str, Condition)] = &[
    ("clear sky", Condition::Sunny),
    ("partly cloudy", Condition::PartlyCloudy),
    ("cloudy", Condition::Cloudy),
    ("overcast", Condition::Cloudy),
    ("light rain", Condition::Rainy),
    ("rain showers", Condition::Rainy),
    ("rain", Condition::Rainy),
    ("light drizzle", Condition::Rainy),
    ("drizzle", Condition::Rainy),
    ("light snow", Condition::Snowy),
    ("snow showers", Condition::Snowy),
    ("snow", Condition::Snowy),
    ("light sleet", Condition::SnowyRainy),
    ("sleet", Condition::SnowyRainy),
    ("fog", Condition::Fog),
    ("mist", Condition::Fog),
    ("thunderstorm", Condition::LightningRainy),
    ("thunder", Condition::Lightning),
    // Icelandic descriptions from the observation feed
    ("heiðskírt", Condition::Sunny),
    ("léttskýjað", Condition::PartlyCloudy),
    ("skýjað", Condition::Cloudy),
    ("alskýjað", Condition::Cloudy),
    ("rigning", Condition::Rainy),
    ("skúrir", Condition::Rainy),
    ("súld", Condition::Rainy),
    ("slydda", Condition::SnowyRainy),
    ("snjókoma", Condition::Snowy),
    ("él", Condition::Snowy),
    ("þoka", Condition::Fog),
    ("þrumuveður", Condition::LightningRainy),
];

impl Condition {
    /// Maps a free-text description to a condition code. Unknown or empty
    /// text is treated as cloudy.
    pub fn from_text(text: Option<&str>) -> Self {
        let Some(text) = text else {
            return Condition::Cloudy;
        };
        let lower = text.trim().to_lowercase();
        if lower.is_empty() {
            return Condition::Cloudy;
        }

        CONDITION_KEYWORDS
            .iter()
            .filter(|(keyword, _)| lower.contains(keyword))
            .max_by_key(|(keyword, _)| keyword.chars().count())
            .map(|(_, condition)| *condition)
            .unwrap_or(Condition::Cloudy)
    }
}

/// Converts a compass abbreviation (Icelandic or English) to degrees.
/// Calm ("Logn") and unknown codes yield None.
pub fn compass_bearing(code: &str) -> Option<f64> {
    let bearing = match code.trim().to_uppercase().as_str() {
        "N" => 0.0,
        "NNA" | "NNE" => 22.5,
        "NA" | "NE" => 45.0,
        "ANA" | "ENE" => 67.5,
        "A" | "E" => 90.0,
        "ASA" | "ESE" => 112.5,
        "SA" | "SE" => 135.0,
        "SSA" | "SSE" => 157.5,
        "S" => 180.0,
        "SSV" | "SSW" => 202.5,
        "SV" | "SW" => 225.0,
        "VSV" | "WSW" => 247.5,
        "V" | "W" => 270.0,
        "VNV" | "WNW" => 292.5,
        "NV" | "NW" => 315.0,
        "NNV" | "NNW" => 337.5,
        _ => return None,
    };
    Some(bearing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_from_english_text() {
        assert_eq!(Condition::from_text(Some("Clear sky")), Condition::Sunny);
        assert_eq!(Condition::from_text(Some("Partly cloudy")), Condition::PartlyCloudy);
        assert_eq!(Condition::from_text(Some("Light sleet")), Condition::SnowyRainy);
        assert_eq!(Condition::from_text(Some("Thunderstorm")), Condition::LightningRainy);
        assert_eq!(Condition::from_text(Some("Rain showers")), Condition::Rainy);
    }

    #[test]
    fn test_condition_from_icelandic_text() {
        assert_eq!(Condition::from_text(Some("Léttskýjað")), Condition::PartlyCloudy);
        assert_eq!(Condition::from_text(Some("Alskýjað")), Condition::Cloudy);
        assert_eq!(Condition::from_text(Some("Rigning")), Condition::Rainy);
    }

    #[test]
    fn test_condition_defaults_to_cloudy() {
        assert_eq!(Condition::from_text(None), Condition::Cloudy);
        assert_eq!(Condition::from_text(Some("")), Condition::Cloudy);
        assert_eq!(Condition::from_text(Some("volcanic ash")), Condition::Cloudy);
    }

    #[test]
    fn test_condition_serializes_as_code() {
        let json = serde_json::to_string(&Condition::SnowyRainy).unwrap();
        assert_eq!(json, "\"snowy-rainy\"");
    }

    #[test]
    fn test_compass_bearing() {
        assert_eq!(compass_bearing("SA"), Some(135.0));
        assert_eq!(compass_bearing("se"), Some(135.0));
        assert_eq!(compass_bearing("NNV"), Some(337.5));
        assert_eq!(compass_bearing("Logn"), None);
        assert_eq!(compass_bearing(""), None);
    }
}
