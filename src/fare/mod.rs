use chrono::NaiveTime;
use serde::Serialize;

use crate::geo::haversine_km;
use crate::models::ride::{FareBreakdown, GeoPoint};

/// Pricing knobs, loaded from the environment at startup.
#[derive(Debug, Clone)]
pub struct FareConfig {
    pub base_fare: f64,
    pub per_km_rate: f64,
    pub peak_multiplier: f64,
    pub peak_windows: Vec<PeakWindow>,
}

#[derive(Debug, Clone, Copy)]
pub struct PeakWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Default for FareConfig {
    fn default() -> Self {
        Self {
            base_fare: 20.0,
            per_km_rate: 10.0,
            peak_multiplier: 1.5,
            peak_windows: Self::default_peak_windows(),
        }
    }
}

impl FareConfig {
    /// Morning and evening rush, matching the default pricing profile.
    pub fn default_peak_windows() -> Vec<PeakWindow> {
        let window = |start, end| PeakWindow {
            start: NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
        };
        vec![window(8, 10), window(17, 20)]
    }

    fn is_peak(&self, at: NaiveTime) -> bool {
        self.peak_windows
            .iter()
            .any(|w| at >= w.start && at <= w.end)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FareQuote {
    pub distance_km: f64,
    #[serde(flatten)]
    pub fare: FareBreakdown,
    pub is_peak: bool,
}

/// Quote a trip: base fare plus per-km charge, with a surcharge of
/// (base + distance) x (multiplier - 1) inside a peak window. Fare
/// components are rounded to whole units, distance to 2 decimals.
pub fn quote(config: &FareConfig, pickup: &GeoPoint, dropoff: &GeoPoint, at: NaiveTime) -> FareQuote {
    let distance_km = haversine_km(pickup, dropoff);

    let base_fare = config.base_fare;
    let distance_fare = (distance_km * config.per_km_rate).round();

    let is_peak = config.is_peak(at);
    let peak_charge = if is_peak {
        ((base_fare + distance_fare) * (config.peak_multiplier - 1.0)).round()
    } else {
        0.0
    };

    let total_fare = (base_fare + distance_fare + peak_charge).round();

    FareQuote {
        distance_km,
        fare: FareBreakdown {
            base_fare,
            distance_fare,
            peak_charge,
            total_fare,
        },
        is_peak,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FareConfig {
        FareConfig::default()
    }

    fn points() -> (GeoPoint, GeoPoint) {
        (
            GeoPoint {
                lat: 12.9716,
                lng: 77.5946,
            },
            GeoPoint {
                lat: 12.9352,
                lng: 77.6245,
            },
        )
    }

    #[test]
    fn off_peak_has_no_surcharge() {
        let (pickup, dropoff) = points();
        let at = NaiveTime::from_hms_opt(14, 0, 0).unwrap();

        let q = quote(&config(), &pickup, &dropoff, at);

        assert!(!q.is_peak);
        assert_eq!(q.fare.peak_charge, 0.0);
        assert_eq!(
            q.fare.total_fare,
            q.fare.base_fare + q.fare.distance_fare
        );
    }

    #[test]
    fn peak_window_applies_multiplier() {
        let (pickup, dropoff) = points();
        let at = NaiveTime::from_hms_opt(8, 30, 0).unwrap();

        let q = quote(&config(), &pickup, &dropoff, at);

        assert!(q.is_peak);
        let expected = ((q.fare.base_fare + q.fare.distance_fare) * 0.5).round();
        assert_eq!(q.fare.peak_charge, expected);
    }

    #[test]
    fn zero_distance_quotes_base_fare() {
        let (pickup, _) = points();
        let at = NaiveTime::from_hms_opt(14, 0, 0).unwrap();

        let q = quote(&config(), &pickup, &pickup, at);

        assert_eq!(q.distance_km, 0.0);
        assert_eq!(q.fare.total_fare, 20.0);
    }
}
