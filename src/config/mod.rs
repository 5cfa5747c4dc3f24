//! Configuration module for the leadflow backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Hours a lead may sit uncontacted before the sweep reclaims it
    pub reassign_threshold_hours: i64,
    /// Interval for the in-process sweep worker; 0 disables it
    pub reassign_interval: Duration,
    /// Maximum number of cache entries before insertion-order eviction
    pub cache_capacity: usize,
    /// Interval for the eager cache expiry sweep
    pub cache_sweep_interval: Duration,
    /// TTL for cached permission grants
    pub authz_ttl: Duration,
    /// Organizational UTC offset in minutes; all wall-clock math uses this
    pub office_utc_offset_minutes: i32,
    /// Office start hour in office-local time
    pub office_start_hour: u32,
    /// Office start minute in office-local time
    pub office_start_minute: u32,
    /// Grace period before a check-in counts as late
    pub grace_minutes: i64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_psk = env::var("LEADFLOW_API_PSK").ok();

        let db_path = env::var("LEADFLOW_DB_PATH")
            .unwrap_or_else(|_| "./data/leadflow.sqlite".to_string())
            .into();

        let bind_addr = env::var("LEADFLOW_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid LEADFLOW_BIND_ADDR format");

        let log_level = env::var("LEADFLOW_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
            reassign_threshold_hours: env_i64("LEADFLOW_REASSIGN_THRESHOLD_HOURS", 8),
            reassign_interval: Duration::from_secs(env_u64("LEADFLOW_REASSIGN_INTERVAL_SECS", 0)),
            cache_capacity: env_u64("LEADFLOW_CACHE_CAPACITY", 1024) as usize,
            cache_sweep_interval: Duration::from_secs(env_u64("LEADFLOW_CACHE_SWEEP_SECS", 60)),
            authz_ttl: Duration::from_secs(env_u64("LEADFLOW_AUTHZ_TTL_SECS", 300)),
            office_utc_offset_minutes: env_i64("LEADFLOW_OFFICE_UTC_OFFSET_MINUTES", 0) as i32,
            office_start_hour: env_u64("LEADFLOW_OFFICE_START_HOUR", 9) as u32,
            office_start_minute: env_u64("LEADFLOW_OFFICE_START_MINUTE", 0) as u32,
            grace_minutes: env_i64("LEADFLOW_GRACE_MINUTES", 15),
        }
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
