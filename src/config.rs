use std::env;
use std::time::Duration;

use crate::error::TrackError;
use crate::models::location::GeoPoint;
use crate::source::PositionOptions;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub bearer_token: String,
    pub log_level: String,
    pub poll_interval_secs: u64,
    pub persist_interval_secs: u64,
    pub oneshot_timeout_secs: u64,
    pub watch_timeout_secs: u64,
    pub watch_maximum_age_secs: u64,
    pub watch_sample_interval_secs: u64,
    pub fallback_lat: f64,
    pub fallback_lng: f64,
    pub event_buffer_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, TrackError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            api_base_url: env::var("API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5000/api".to_string()),
            bearer_token: env::var("BEARER_TOKEN").unwrap_or_default(),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            poll_interval_secs: parse_or_default("POLL_INTERVAL_SECS", 3)?,
            persist_interval_secs: parse_or_default("PERSIST_INTERVAL_SECS", 30)?,
            oneshot_timeout_secs: parse_or_default("ONESHOT_TIMEOUT_SECS", 10)?,
            watch_timeout_secs: parse_or_default("WATCH_TIMEOUT_SECS", 30)?,
            watch_maximum_age_secs: parse_or_default("WATCH_MAXIMUM_AGE_SECS", 10)?,
            watch_sample_interval_secs: parse_or_default("WATCH_SAMPLE_INTERVAL_SECS", 5)?,
            fallback_lat: parse_or_default("FALLBACK_LAT", 33.5731)?,
            fallback_lng: parse_or_default("FALLBACK_LNG", -7.5898)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
        })
    }

    /// Default city center used whenever the device cannot produce a fix.
    pub fn fallback(&self) -> GeoPoint {
        GeoPoint {
            lat: self.fallback_lat,
            lng: self.fallback_lng,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn persist_interval(&self) -> Duration {
        Duration::from_secs(self.persist_interval_secs)
    }

    pub fn watch_sample_interval(&self) -> Duration {
        Duration::from_secs(self.watch_sample_interval_secs)
    }

    /// One-shot fixes want a fresh position and give up quickly.
    pub fn oneshot_options(&self) -> PositionOptions {
        PositionOptions {
            high_accuracy: true,
            timeout: Duration::from_secs(self.oneshot_timeout_secs),
            maximum_age: Duration::ZERO,
        }
    }

    /// Continuous tracking tolerates cached fixes to reduce GPS churn.
    pub fn watch_options(&self) -> PositionOptions {
        PositionOptions {
            high_accuracy: true,
            timeout: Duration::from_secs(self.watch_timeout_secs),
            maximum_age: Duration::from_secs(self.watch_maximum_age_secs),
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, TrackError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| TrackError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
