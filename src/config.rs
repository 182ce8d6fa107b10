use std::env;

use crate::error::AppError;
use crate::fare::FareConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub fare: FareConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            fare: FareConfig {
                base_fare: parse_or_default("BASE_FARE", 20.0)?,
                per_km_rate: parse_or_default("PER_KM_RATE", 10.0)?,
                peak_multiplier: parse_or_default("PEAK_MULTIPLIER", 1.5)?,
                peak_windows: FareConfig::default_peak_windows(),
            },
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
