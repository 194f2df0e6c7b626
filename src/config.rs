//! Centralised runtime settings.
//!
//! Every knob comes from an environment variable with a sensible default,
//! so a bare `mediq` starts on a laptop and deployments override via env.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "MediQ";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the application data directory
/// ~/MediQ/ on all platforms (user-visible, holds the queue database)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join(APP_NAME)
}

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    "info,mediq=debug".to_string()
}

/// Runtime settings resolved from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    /// HTTP bind address (`MEDIQ_BIND`).
    pub bind_addr: SocketAddr,
    /// SQLite database file (`MEDIQ_DB`). Defaults to `<data dir>/mediq.db`.
    pub db_path: PathBuf,
    /// Base URL of the local Ollama instance for urgency triage (`MEDIQ_OLLAMA_URL`).
    pub ollama_url: String,
    /// Model name used for urgency triage (`MEDIQ_TRIAGE_MODEL`).
    pub triage_model: String,
    /// Per-call classifier timeout in seconds (`MEDIQ_TRIAGE_TIMEOUT_SECS`).
    /// Registration never waits longer than this; on expiry the default
    /// urgency is used.
    pub triage_timeout: Duration,
    /// Disable the classifier entirely (`MEDIQ_TRIAGE_ENABLED=false`).
    pub triage_enabled: bool,
    /// Average consultation length in minutes (`MEDIQ_AVG_CONSULT_MINUTES`),
    /// used for wait estimation.
    pub avg_consult_minutes: i64,
    /// Interval between full queue recalculations (`MEDIQ_RECALC_SECS`).
    pub recalc_interval: Duration,
    /// Hour of day (UTC, 0–23) for the daily counter reset (`MEDIQ_RESET_HOUR`).
    pub reset_hour: u32,
}

impl Settings {
    /// Resolve settings from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_parsed("MEDIQ_BIND", "0.0.0.0:8000"),
            db_path: std::env::var("MEDIQ_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|_| app_data_dir().join("mediq.db")),
            ollama_url: env_or("MEDIQ_OLLAMA_URL", "http://localhost:11434"),
            triage_model: env_or("MEDIQ_TRIAGE_MODEL", "llama3.1:8b"),
            triage_timeout: Duration::from_secs(env_parsed("MEDIQ_TRIAGE_TIMEOUT_SECS", "8")),
            triage_enabled: env_parsed("MEDIQ_TRIAGE_ENABLED", "true"),
            avg_consult_minutes: env_parsed("MEDIQ_AVG_CONSULT_MINUTES", "12"),
            recalc_interval: Duration::from_secs(env_parsed("MEDIQ_RECALC_SECS", "60")),
            reset_hour: env_parsed("MEDIQ_RESET_HOUR", "0"),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: &str) -> T {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse().unwrap_or_else(|_| {
        tracing::warn!(key, raw, "Unparseable setting, using default");
        default
            .parse()
            .unwrap_or_else(|_| panic!("Invalid built-in default for {key}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with("MediQ"));
    }

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::from_env();
        assert_eq!(settings.avg_consult_minutes, 12);
        assert_eq!(settings.recalc_interval, Duration::from_secs(60));
        assert!(settings.reset_hour < 24);
        assert!(settings.bind_addr.port() > 0);
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
    }
}
