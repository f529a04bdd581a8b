use serde::Deserialize;
use std::env;
use std::time::Duration;

use boxoffice_core::RetryPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub reservation: ReservationConfig,
    #[serde(default)]
    pub api: ApiConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_max_connections() -> u32 { 5 }
fn default_busy_timeout_ms() -> u64 { 5_000 }

/// Optimistic retry bounds for inventory writes
#[derive(Debug, Deserialize, Clone)]
pub struct ReservationConfig {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff_ms: 2,
            max_backoff_ms: 50,
        }
    }
}

impl ReservationConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_backoff: Duration::from_millis(self.base_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Upper bound on a single purchase, refund or resize call
    pub operation_timeout_ms: u64,
    /// Buffered inventory notifications per live stream
    pub stream_buffer: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: 2_000,
            stream_buffer: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Untracked local overrides
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `BOXOFFICE__SERVER__PORT=9000`
            .add_source(config::Environment::with_prefix("BOXOFFICE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
