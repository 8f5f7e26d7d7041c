use std::env;

use chrono::{FixedOffset, NaiveTime};

use crate::error::{AppError, AppResult};
use crate::services::pricing::{PeakWindow, PeakWindowConfig};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub server_host: String,
    pub server_port: u16,
    pub peak: PeakWindowConfig,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let offset_minutes: i32 = parse_or_default("PEAK_UTC_OFFSET_MINUTES", 0)?;
        let utc_offset = FixedOffset::east_opt(offset_minutes * 60).ok_or_else(|| {
            AppError::Internal(format!("invalid PEAK_UTC_OFFSET_MINUTES: {offset_minutes}"))
        })?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: parse_or_default("DATABASE_MAX_CONNECTIONS", 10)?,
            jwt_secret: required("JWT_SECRET")?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parse_or_default("SERVER_PORT", 3000)?,
            peak: PeakWindowConfig {
                morning: window_from_env("PEAK_MORNING", "07:00", "09:00")?,
                evening: window_from_env("PEAK_EVENING", "17:00", "19:00")?,
                utc_offset,
            },
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn required(key: &str) -> AppResult<String> {
    env::var(key).map_err(|_| AppError::Internal(format!("{key} must be set")))
}

fn parse_or_default<T>(key: &str, default: T) -> AppResult<T>
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

/// Reads `<PREFIX>_START` / `<PREFIX>_END`; an empty value disables the window.
fn window_from_env(prefix: &str, start: &str, end: &str) -> AppResult<Option<PeakWindow>> {
    let start_key = format!("{prefix}_START");
    let end_key = format!("{prefix}_END");
    let start = env::var(&start_key).unwrap_or_else(|_| start.to_string());
    let end = env::var(&end_key).unwrap_or_else(|_| end.to_string());

    if start.trim().is_empty() || end.trim().is_empty() {
        return Ok(None);
    }

    Ok(Some(PeakWindow {
        start: parse_time(&start_key, &start)?,
        end: parse_time(&end_key, &end)?,
    }))
}

fn parse_time(key: &str, raw: &str) -> AppResult<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|err| AppError::Internal(format!("invalid {key} ({raw}): {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hour_minute_times() {
        let t = parse_time("PEAK_MORNING_START", "07:30").unwrap();
        assert_eq!(t, NaiveTime::from_hms_opt(7, 30, 0).unwrap());
    }

    #[test]
    fn rejects_malformed_times() {
        assert!(parse_time("PEAK_EVENING_END", "7pm").is_err());
    }
}
