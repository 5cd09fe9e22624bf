//! Process configuration from environment variables.

use std::time::Duration;

use arcana_infra::RetryPolicy;

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Runtime configuration for the API process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listen address (`BIND_ADDR`, default `0.0.0.0:8080`).
    pub bind_addr: String,
    /// Minimum time between two submissions from the same user
    /// (`SUBMIT_COOLDOWN_SECS`, default 120).
    pub cooldown: Duration,
    /// Retry envelope per stage (`STAGE_MAX_ATTEMPTS` / `STAGE_BASE_DELAY_MS`,
    /// defaults 3 / 500).
    pub retry: RetryPolicy,
    /// Deadline per stage attempt (`STAGE_TIMEOUT_SECS`, default 30).
    pub stage_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            cooldown: Duration::from_secs(env_u64("SUBMIT_COOLDOWN_SECS", 120)),
            retry: RetryPolicy::linear(
                env_u64("STAGE_MAX_ATTEMPTS", 3) as u32,
                Duration::from_millis(env_u64("STAGE_BASE_DELAY_MS", 500)),
            ),
            stage_timeout: Duration::from_secs(env_u64("STAGE_TIMEOUT_SECS", 30)),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            cooldown: Duration::from_secs(120),
            retry: RetryPolicy::default(),
            stage_timeout: Duration::from_secs(30),
        }
    }
}
