//! Values neither feed supplies directly.

use crate::models::Field;

/// Wind chill is only modelled at or below this temperature (°C)
pub const WIND_CHILL_MAX_TEMP_C: f64 = 10.0;
/// Below this wind speed (km/h) wind chill is not perceptible
pub const WIND_CHILL_MIN_WIND_KMH: f64 = 4.8;

const MPS_TO_KMH: f64 = 3.6;

// JAG/TI wind chill coefficients
const WC_BASE: f64 = 13.12;
const WC_TEMP: f64 = 0.6215;
const WC_WIND: f64 = 11.37;
const WC_TEMP_WIND: f64 = 0.3965;
const WC_WIND_EXPONENT: f64 = 0.16;

/// Feels-like temperature (°C) from air temperature (°C) and wind speed (m/s).
///
/// Pure and deterministic. The result is rounded to 0.1 °C and never exceeds
/// the air temperature.
pub fn feels_like(temperature: f64, wind_speed_mps: f64) -> f64 {
    let wind_kmh = wind_speed_mps * MPS_TO_KMH;
    if temperature > WIND_CHILL_MAX_TEMP_C || wind_kmh < WIND_CHILL_MIN_WIND_KMH {
        return temperature;
    }

    let wind_factor = wind_kmh.powf(WC_WIND_EXPONENT);
    let chill = WC_BASE + WC_TEMP * temperature - WC_WIND * wind_factor
        + WC_TEMP_WIND * temperature * wind_factor;

    round_tenth(chill).min(temperature)
}

/// Feels-like for merged fields; unavailable unless both inputs are present
pub fn feels_like_field(temperature: &Field<f64>, wind_speed: &Field<f64>) -> Field<f64> {
    match (temperature.get(), wind_speed.get()) {
        (Some(t), Some(w)) => Field::Derived(feels_like(t, w)),
        _ => Field::Unavailable,
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_wind_is_air_temperature() {
        for t in [-30.0, -2.0, 0.0, 4.37, 10.0, 25.0] {
            assert_eq!(feels_like(t, 0.0), t);
        }
    }

    #[test]
    fn test_light_wind_below_threshold() {
        // 1.3 m/s = 4.68 km/h
        assert_eq!(feels_like(-5.0, 1.3), -5.0);
    }

    #[test]
    fn test_warm_air_is_not_chilled() {
        assert_eq!(feels_like(15.0, 20.0), 15.0);
    }

    #[test]
    fn test_known_reading() {
        // -2 °C at 12 m/s (43.2 km/h)
        let value = feels_like(-2.0, 12.0);
        assert_eq!(value, -10.3);
    }

    #[test]
    fn test_never_warmer_than_air() {
        let mut t = -40.0;
        while t <= 35.0 {
            let mut w = 0.0;
            while w <= 40.0 {
                let value = feels_like(t, w);
                assert!(value <= t, "feels_like({}, {}) = {}", t, w, value);
                w += 0.7;
            }
            t += 0.9;
        }
    }

    #[test]
    fn test_more_wind_feels_colder() {
        let calm = feels_like(-5.0, 2.0);
        let windy = feels_like(-5.0, 10.0);
        let gale = feels_like(-5.0, 25.0);
        assert!(windy < calm);
        assert!(gale < windy);
    }

    #[test]
    fn test_deterministic() {
        let first = feels_like(3.3, 7.7);
        for _ in 0..100 {
            assert_eq!(feels_like(3.3, 7.7), first);
        }
    }

    #[test]
    fn test_field_requires_both_inputs() {
        assert_eq!(
            feels_like_field(&Field::Observation(5.0), &Field::Unavailable),
            Field::Unavailable
        );
        assert_eq!(
            feels_like_field(&Field::Unavailable, &Field::Forecast(3.0)),
            Field::Unavailable
        );
        assert_eq!(
            feels_like_field(&Field::Observation(5.0), &Field::Forecast(3.0)),
            Field::Derived(feels_like(5.0, 3.0))
        );
    }
}
