//! Configuration module for the outlet task backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;

/// Secret used when `TASKS_JWT_SECRET` is not set. Only suitable for development.
pub const DEV_JWT_SECRET: &str = "outlet-tasks-dev-secret";

/// Accepted range for token and invitation lifetimes, one hour to a year.
const TTL_HOURS: std::ops::RangeInclusive<i64> = 1..=8760;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,
    /// HMAC secret for session tokens
    pub jwt_secret: String,
    /// Whether `jwt_secret` came from the environment
    pub jwt_secret_configured: bool,
    pub token_ttl_hours: i64,
    pub invitation_ttl_hours: i64,
    /// Interval of the background overdue sweep, `None` when disabled
    pub sweep_interval: Option<Duration>,
    /// Capacity of the notification dedup cache
    pub notify_dedup_capacity: usize,
    /// Business timezone used to decide what "today" is
    pub timezone: Tz,
    /// Bootstrap admin credentials
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

/// A configuration value that could not be parsed.
#[derive(Debug)]
pub struct ConfigError {
    pub variable: &'static str,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}: {}", self.variable, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("TASKS_DB_PATH")
            .unwrap_or_else(|| "./data/tasks.sqlite".to_string())
            .into();

        let bind_addr = lookup("TASKS_BIND_ADDR")
            .unwrap_or_else(|| "127.0.0.1:8080".to_string());
        let bind_addr = bind_addr.parse().map_err(|e| ConfigError {
            variable: "TASKS_BIND_ADDR",
            message: format!("{} ({})", bind_addr, e),
        })?;

        let log_level = lookup("TASKS_LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let log_json = match lookup("TASKS_LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("") | Some("text") => false,
            Some("json") => true,
            Some(other) => {
                return Err(ConfigError {
                    variable: "TASKS_LOG_FORMAT",
                    message: format!("{} (expected text or json)", other),
                })
            }
        };

        let (jwt_secret, jwt_secret_configured) = match lookup("TASKS_JWT_SECRET") {
            Some(secret) if !secret.trim().is_empty() => (secret, true),
            _ => (DEV_JWT_SECRET.to_string(), false),
        };

        let token_ttl_hours = parse_ttl(&lookup, "TASKS_TOKEN_TTL_HOURS", 12)?;
        let invitation_ttl_hours = parse_ttl(&lookup, "TASKS_INVITATION_TTL_HOURS", 72)?;
        let sweep_secs: u64 = parse_number(&lookup, "TASKS_SWEEP_INTERVAL_SECS", 300)?;
        let notify_dedup_capacity = parse_number(&lookup, "TASKS_NOTIFY_DEDUP_CAPACITY", 100)?;

        let timezone = match lookup("TASKS_TIMEZONE") {
            Some(name) => name.parse::<Tz>().map_err(|e| ConfigError {
                variable: "TASKS_TIMEZONE",
                message: e.to_string(),
            })?,
            None => Tz::UTC,
        };

        Ok(Self {
            db_path,
            bind_addr,
            log_level,
            log_json,
            jwt_secret,
            jwt_secret_configured,
            token_ttl_hours,
            invitation_ttl_hours,
            sweep_interval: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
            notify_dedup_capacity,
            timezone,
            admin_email: lookup("TASKS_ADMIN_EMAIL").filter(|s| !s.trim().is_empty()),
            admin_password: lookup("TASKS_ADMIN_PASSWORD").filter(|s| !s.is_empty()),
        })
    }
}

fn parse_number<F, T>(lookup: &F, variable: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(variable) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError {
            variable,
            message: format!("{} ({})", raw, e),
        }),
        None => Ok(default),
    }
}

fn parse_ttl<F>(lookup: &F, variable: &'static str, default: i64) -> Result<i64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let hours = parse_number(lookup, variable, default)?;
    if !TTL_HOURS.contains(&hours) {
        return Err(ConfigError {
            variable,
            message: format!(
                "{} (expected {} to {} hours)",
                hours,
                TTL_HOURS.start(),
                TTL_HOURS.end()
            ),
        });
    }
    Ok(hours)
}
