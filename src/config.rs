use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;

/// Knobs the engine reads on every tick.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub timezone: Tz,
    pub execution_window: chrono::Duration,
    pub lease_ttl: chrono::Duration,
    pub retry_backoff: chrono::Duration,
    pub max_concurrent_jobs: usize,
    pub alternate_date_window_days: u32,
    pub store_timeout: Duration,
    pub scan_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Asia::Kolkata,
            execution_window: chrono::Duration::minutes(20),
            lease_ttl: chrono::Duration::seconds(900),
            retry_backoff: chrono::Duration::minutes(15),
            max_concurrent_jobs: 4,
            alternate_date_window_days: 7,
            store_timeout: Duration::from_millis(5000),
            scan_limit: 100,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub scan_interval: Duration,
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup. Malformed values abort startup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = EngineConfig::default();

        let timezone = match lookup("JOB_TIMEZONE") {
            Some(name) => name
                .parse::<Tz>()
                .unwrap_or_else(|_| panic!("JOB_TIMEZONE '{}' is not a known time zone", name)),
            None => defaults.timezone,
        };

        let engine = EngineConfig {
            timezone,
            execution_window: chrono::Duration::minutes(parse_or(&lookup, "EXECUTION_WINDOW_MINUTES", 20)),
            lease_ttl: chrono::Duration::seconds(parse_or(&lookup, "LEASE_TTL_SECS", 900)),
            retry_backoff: chrono::Duration::minutes(parse_or(&lookup, "RETRY_BACKOFF_MINUTES", 15)),
            max_concurrent_jobs: parse_or(&lookup, "MAX_CONCURRENT_JOBS", defaults.max_concurrent_jobs).max(1),
            alternate_date_window_days: parse_or(&lookup, "ALTERNATE_DATE_WINDOW_DAYS", defaults.alternate_date_window_days),
            store_timeout: Duration::from_millis(parse_or(&lookup, "STORE_TIMEOUT_MS", 5000)),
            scan_limit: parse_or(&lookup, "SCAN_LIMIT", defaults.scan_limit),
        };

        Self {
            database_url: lookup("DATABASE_URL").expect("DATABASE_URL must be set"),
            port: parse_or(&lookup, "PORT", 3000),
            scan_interval: Duration::from_secs(parse_or(&lookup, "SCAN_INTERVAL_SECS", 300)),
            engine,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{} must be a number, got '{}'", key, raw)),
        None => default,
    }
}
