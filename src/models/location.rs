use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TrackError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Result<Self, TrackError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(TrackError::InvalidCoordinate(format!(
                "latitude {lat} out of range [-90, 90]"
            )));
        }

        if !(-180.0..=180.0).contains(&lng) {
            return Err(TrackError::InvalidCoordinate(format!(
                "longitude {lng} out of range [-180, 180]"
            )));
        }

        Ok(Self { lat, lng })
    }

    /// The backend stores (0, 0) for users that never set an address.
    pub fn is_meaningful(&self) -> bool {
        self.lat != 0.0 || self.lng != 0.0
    }

    pub fn display(&self) -> String {
        format!("{:.4}, {:.4}", self.lat, self.lng)
    }
}

/// Latest known position of a tracked entity. Only the most recent sample
/// per entity is ever retained; `seq` orders samples from the same source
/// so a slow network response cannot overwrite a newer one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub point: GeoPoint,
    pub accuracy_m: Option<f64>,
    pub address: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub seq: u64,
}

impl LocationSample {
    pub fn new(point: GeoPoint, seq: u64) -> Self {
        Self {
            point,
            accuracy_m: None,
            address: Some(point.display()),
            recorded_at: Utc::now(),
            seq,
        }
    }

    pub fn is_newer_than(&self, other: &LocationSample) -> bool {
        if self.recorded_at != other.recorded_at {
            return self.recorded_at > other.recorded_at;
        }

        self.seq > other.seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn rejects_out_of_range_latitude() {
        assert!(GeoPoint::new(91.0, 0.0).is_err());
        assert!(GeoPoint::new(-90.5, 0.0).is_err());
        assert!(GeoPoint::new(90.0, 180.0).is_ok());
    }

    #[test]
    fn rejects_out_of_range_longitude() {
        assert!(GeoPoint::new(0.0, 180.1).is_err());
        assert!(GeoPoint::new(0.0, -181.0).is_err());
    }

    #[test]
    fn null_island_is_not_meaningful() {
        let unset = GeoPoint { lat: 0.0, lng: 0.0 };
        let casablanca = GeoPoint {
            lat: 33.5731,
            lng: -7.5898,
        };
        assert!(!unset.is_meaningful());
        assert!(casablanca.is_meaningful());
    }

    #[test]
    fn newer_timestamp_wins_regardless_of_seq() {
        let point = GeoPoint {
            lat: 33.5731,
            lng: -7.5898,
        };
        let older = LocationSample::new(point, 5);
        let mut newer = LocationSample::new(point, 1);
        newer.recorded_at = older.recorded_at + Duration::seconds(1);

        assert!(newer.is_newer_than(&older));
        assert!(!older.is_newer_than(&newer));
    }

    #[test]
    fn seq_breaks_timestamp_ties() {
        let point = GeoPoint {
            lat: 33.5731,
            lng: -7.5898,
        };
        let first = LocationSample::new(point, 1);
        let mut second = LocationSample::new(point, 2);
        second.recorded_at = first.recorded_at;

        assert!(second.is_newer_than(&first));
        assert!(!first.is_newer_than(&second));
    }
}
