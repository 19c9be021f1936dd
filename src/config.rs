use serde::{Deserialize, Serialize};

use crate::common::types::AnyResult;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub socket: SocketConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    pub logging: Option<LoggingConfig>,
}

/// Where the REST command surface lives.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Opaque session identifier sent as-is with every request.
    #[serde(default)]
    pub session: Option<String>,
}

/// Where the push channel lives.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SocketConfig {
    pub url: String,
    #[serde(default)]
    pub session: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// How long an unconfirmed optimistic delta may stay visible.
    #[serde(default = "default_command_expiry_ms")]
    pub command_expiry_ms: u64,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            command_expiry_ms: default_command_expiry_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub filters: Option<String>,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_command_expiry_ms() -> u64 {
    5_000
}

fn default_reconnect_delay_ms() -> u64 {
    1_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

impl Config {
    pub fn load() -> AnyResult<Self> {
        let config_str = std::fs::read_to_string("config.toml").unwrap_or_else(|_| "".to_string());
        if config_str.is_empty() {
            return Err("config.toml not found or empty".into());
        }
        let config: Config = toml::from_str(&config_str)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [api]
            base_url = "http://127.0.0.1:8080/api"

            [socket]
            url = "ws://127.0.0.1:8080/socket"
            "#,
        )
        .expect("parse");

        assert_eq!(config.api.request_timeout_ms, 10_000);
        assert_eq!(config.sync.command_expiry_ms, 5_000);
        assert!(config.logging.is_none());
    }
}
