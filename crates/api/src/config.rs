//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use saga::{CircuitBreakerConfig, OrchestratorConfig};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `json` for JSON lines, anything else for human-readable
/// - `DATABASE_URL` — PostgreSQL connection string; in-memory stores if unset
/// - `INVENTORY_URL` — inventory authority base URL; seeded in-memory
///   inventory if unset
/// - `INVENTORY_TIMEOUT_MS` — per-request timeout (default: `3000`)
/// - `BREAKER_FAILURE_RATE` — failure ratio that opens the breaker (default: `0.5`)
/// - `BREAKER_WINDOW_SIZE` — calls in the rolling window (default: `10`)
/// - `BREAKER_MINIMUM_CALLS` — calls before the rate is evaluated (default: `5`)
/// - `BREAKER_OPEN_SECS` — seconds the breaker stays open (default: `30`)
/// - `BREAKER_HALF_OPEN_PROBES` — trial calls when half-open (default: `3`)
/// - `CANCELLATION_WINDOW_HOURS` — cancellation window (default: `24`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub inventory_url: Option<String>,
    pub inventory_timeout: Duration,
    pub breaker_failure_rate: f64,
    pub breaker_window_size: usize,
    pub breaker_minimum_calls: usize,
    pub breaker_open_duration: Duration,
    pub breaker_half_open_probes: usize,
    pub cancellation_window_hours: i64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from `lookup`, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parsed(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref().map(str::trim) {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            database_url: non_empty("DATABASE_URL"),
            inventory_url: non_empty("INVENTORY_URL"),
            inventory_timeout: parsed(&lookup, "INVENTORY_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.inventory_timeout),
            breaker_failure_rate: parsed(&lookup, "BREAKER_FAILURE_RATE")
                .unwrap_or(defaults.breaker_failure_rate),
            breaker_window_size: parsed(&lookup, "BREAKER_WINDOW_SIZE")
                .unwrap_or(defaults.breaker_window_size),
            breaker_minimum_calls: parsed(&lookup, "BREAKER_MINIMUM_CALLS")
                .unwrap_or(defaults.breaker_minimum_calls),
            breaker_open_duration: parsed(&lookup, "BREAKER_OPEN_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.breaker_open_duration),
            breaker_half_open_probes: parsed(&lookup, "BREAKER_HALF_OPEN_PROBES")
                .unwrap_or(defaults.breaker_half_open_probes),
            cancellation_window_hours: parsed(&lookup, "CANCELLATION_WINDOW_HOURS")
                .unwrap_or(defaults.cancellation_window_hours),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::builder()
            .failure_rate_threshold(self.breaker_failure_rate)
            .window_size(self.breaker_window_size)
            .minimum_calls(self.breaker_minimum_calls)
            .open_duration(self.breaker_open_duration)
            .half_open_probes(self.breaker_half_open_probes)
            .build()
    }

    /// Negative or out-of-range windows fall back to the default.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let cancellation_window = Some(self.cancellation_window_hours)
            .filter(|hours| *hours >= 0)
            .and_then(chrono::Duration::try_hours)
            .unwrap_or_else(|| {
                tracing::warn!(
                    hours = self.cancellation_window_hours,
                    "invalid cancellation window, using default"
                );
                chrono::Duration::hours(domain::DEFAULT_CANCELLATION_WINDOW_HOURS)
            });
        OrchestratorConfig {
            cancellation_window,
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        let breaker = CircuitBreakerConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            inventory_url: None,
            inventory_timeout: Duration::from_millis(3000),
            breaker_failure_rate: breaker.failure_rate_threshold,
            breaker_window_size: breaker.window_size,
            breaker_minimum_calls: breaker.minimum_calls,
            breaker_open_duration: breaker.open_duration,
            breaker_half_open_probes: breaker.half_open_probes,
            cancellation_window_hours: domain::DEFAULT_CANCELLATION_WINDOW_HOURS,
        }
    }
}
