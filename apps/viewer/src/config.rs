// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

use castlink_core::backoff::BackoffPolicy;
use castlink_core::types::{IceServer, PeerConfig, DEFAULT_ICE_CANDIDATE_POOL_SIZE};
use castlink_engine::constants::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_MAX_MS, DEFAULT_ICE_GATHER_TIMEOUT_MS,
    DEFAULT_MAX_RETRIES, DEFAULT_RECOVERY_TIMEOUT_MS, DEFAULT_TEARDOWN_STEP_TIMEOUT_MS,
    DEFAULT_VIEWER_EVENT_CAPACITY,
};
use castlink_engine::CoordinatorConfig;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::Level;

/// Where the stream directory and the signaling server live.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ServerConfig {
    /// Base URL of the stream/channel REST service.
    pub api_url: String,
    /// Base URL of the signaling server. `http(s)` is mapped to `ws(s)`.
    pub signaling_url: String,
    /// Viewer auth token sent to both services. Usually set through
    /// `CASTLINK_SERVER__TOKEN` rather than the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            signaling_url: "ws://localhost:8000".to_string(),
            token: None,
        }
    }
}

/// Retry and timer tuning for the connection coordinator.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ConnectionConfig {
    /// Automatic retries before giving up (default: 3)
    pub max_retries: u32,
    /// First retry delay, doubled per attempt (default: 1000)
    pub backoff_base_ms: u64,
    /// Cap on any single retry delay (default: 10000)
    pub backoff_max_ms: u64,
    /// ICE gathering deadline per attempt (default: 12000)
    pub ice_gather_timeout_ms: u64,
    /// Deadline for a whole recovery chain (default: 30000)
    pub recovery_timeout_ms: u64,
    /// Bound on each provider cleanup step (default: 5000)
    pub teardown_step_timeout_ms: u64,
    /// Viewer event buffer; slow renderers skip the oldest events beyond it (default: 256)
    pub event_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            ice_gather_timeout_ms: DEFAULT_ICE_GATHER_TIMEOUT_MS,
            recovery_timeout_ms: DEFAULT_RECOVERY_TIMEOUT_MS,
            teardown_step_timeout_ms: DEFAULT_TEARDOWN_STEP_TIMEOUT_MS,
            event_capacity: DEFAULT_VIEWER_EVENT_CAPACITY,
        }
    }
}

/// STUN/TURN servers handed to every peer connection.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct IceConfig {
    pub candidate_pool_size: u8,
    pub servers: Vec<IceServer>,
}

impl Default for IceConfig {
    fn default() -> Self {
        let peer = PeerConfig::default();
        Self { candidate_pool_size: DEFAULT_ICE_CANDIDATE_POOL_SIZE, servers: peer.ice_servers }
    }
}

/// Log level for filtering messages.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Log file format options.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Plain text format
    #[default]
    Text,
    /// JSON format, one object per line
    Json,
}

/// Logging configuration for console and file output.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct LogConfig {
    #[serde(default)]
    pub console_enable: bool,
    #[serde(default)]
    pub file_enable: bool,
    #[serde(default)]
    pub console_level: LogLevel,
    #[serde(default)]
    pub file_level: LogLevel,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub file_format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            // Chat and status go to stdout; keep the console quiet by default.
            console_enable: true,
            file_enable: false,
            console_level: LogLevel::Warn,
            file_level: LogLevel::Info,
            file_path: "./castlink.log".to_string(),
            file_format: LogFormat::default(),
        }
    }
}

/// Root configuration for the `castlink` viewer.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub ice: IceConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Engine-side view of this configuration.
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        let c = &self.connection;
        CoordinatorConfig {
            max_retries: c.max_retries,
            backoff: BackoffPolicy::from_millis(c.backoff_base_ms, c.backoff_max_ms),
            ice_gather_timeout: Duration::from_millis(c.ice_gather_timeout_ms),
            recovery_timeout: Duration::from_millis(c.recovery_timeout_ms),
            teardown_step_timeout: Duration::from_millis(c.teardown_step_timeout_ms),
            peer: PeerConfig {
                ice_servers: self.ice.servers.clone(),
                ice_candidate_pool_size: self.ice.candidate_pool_size,
            },
            viewer_event_capacity: c.event_capacity,
        }
    }
}

/// Result of loading configuration, including whether the config file was missing.
pub struct ConfigLoadResult {
    pub config: Config,
    pub file_missing: Option<String>,
}

/// Loads configuration: defaults, then the TOML file if present, then
/// `CASTLINK_`-prefixed environment variables (`__` separates sections).
///
/// # Errors
///
/// Returns an error if the configuration file exists but cannot be parsed,
/// or if environment variables contain invalid values.
pub fn load(config_path: &str) -> Result<ConfigLoadResult, Box<figment::Error>> {
    let mut figment =
        Figment::new().merge(figment::providers::Serialized::defaults(Config::default()));

    let mut file_missing = None;

    if std::path::Path::new(config_path).exists() {
        figment = figment.merge(Toml::file(config_path));
    } else {
        file_missing = Some(config_path.to_string());
    }

    let config: Config =
        figment.merge(Env::prefixed("CASTLINK_").split("__")).extract().map_err(Box::new)?;

    Ok(ConfigLoadResult { config, file_missing })
}

/// Serializes the default configuration to TOML.
///
/// # Errors
///
/// Returns an error if the default configuration cannot be serialized.
pub fn generate_default() -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&Config::default())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_defaults_match_engine() {
        let config = Config::default().coordinator_config();
        let engine = CoordinatorConfig::default();

        assert_eq!(config.max_retries, engine.max_retries);
        assert_eq!(config.backoff, engine.backoff);
        assert_eq!(config.ice_gather_timeout, engine.ice_gather_timeout);
        assert_eq!(config.recovery_timeout, engine.recovery_timeout);
        assert_eq!(config.teardown_step_timeout, engine.teardown_step_timeout);
        assert_eq!(config.peer, engine.peer);
        assert_eq!(config.viewer_event_capacity, engine.viewer_event_capacity);
    }

    #[test]
    fn test_file_and_env_layers() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "castlink.toml",
                r#"
                [server]
                api_url = "https://api.example.com"
                signaling_url = "wss://signal.example.com"

                [connection]
                max_retries = 5

                [[ice.servers]]
                urls = ["turn:turn.example.com:3478"]
                username = "viewer"
                credential = "secret"
                "#,
            )?;
            jail.set_env("CASTLINK_SERVER__TOKEN", "env-token");
            jail.set_env("CASTLINK_CONNECTION__BACKOFF_BASE_MS", "250");

            let loaded = load("castlink.toml").map_err(|e| e.to_string())?;
            assert!(loaded.file_missing.is_none());

            let config = loaded.config;
            assert_eq!(config.server.api_url, "https://api.example.com");
            assert_eq!(config.server.token.as_deref(), Some("env-token"));
            assert_eq!(config.connection.max_retries, 5);
            assert_eq!(config.connection.backoff_base_ms, 250);
            // Untouched fields keep their defaults.
            assert_eq!(config.connection.ice_gather_timeout_ms, DEFAULT_ICE_GATHER_TIMEOUT_MS);

            let engine = config.coordinator_config();
            assert_eq!(engine.backoff.base_delay, Duration::from_millis(250));
            assert_eq!(engine.peer.ice_servers.len(), 1);
            assert_eq!(engine.peer.ice_servers[0].username.as_deref(), Some("viewer"));
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        figment::Jail::expect_with(|_jail| {
            let loaded = load("does-not-exist.toml").map_err(|e| e.to_string())?;
            assert_eq!(loaded.file_missing.as_deref(), Some("does-not-exist.toml"));
            assert_eq!(loaded.config.connection.max_retries, DEFAULT_MAX_RETRIES);
            assert_eq!(loaded.config.ice.servers.len(), 5);
            Ok(())
        });
    }

    #[test]
    fn test_generated_default_parses_back() {
        let text = generate_default().unwrap();
        assert!(text.contains("[connection]"));
        assert!(!text.contains("token"));

        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.ice.candidate_pool_size, DEFAULT_ICE_CANDIDATE_POOL_SIZE);
        assert_eq!(parsed.server.signaling_url, "ws://localhost:8000");
    }
}
