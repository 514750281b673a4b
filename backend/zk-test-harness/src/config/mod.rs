mod duration_format;

use crate::error::config::ConfigError;
use crate::{LOOPBACK_HOSTNAME, ZOOKEEPER_SERVER_BINARY};

use common::ErrorLocation;

use std::collections::BTreeMap;
use std::env;
use std::panic::Location;
use std::path::Path;
use std::time::Duration;

use humantime::parse_duration;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "zk-test-server.toml";

pub const ENV_SERVER_BINARY: &str = "ZK_TEST_SERVER_BIN";
pub const ENV_SERVER_HOST: &str = "ZK_TEST_SERVER_HOST";
pub const ENV_SERVER_PORT: &str = "ZK_TEST_SERVER_PORT";
pub const ENV_STARTUP_TIMEOUT: &str = "ZK_TEST_STARTUP_TIMEOUT";

/// `zoo.cfg` keys the harness writes itself; overriding them would detach the
/// instance from the port and directory the harness tracks.
pub const RESERVED_PROPERTIES: [&str; 3] = ["dataDir", "clientPort", "clientPortAddress"];

// ============================================
// CONFIG STRUCT
// ============================================

/// Settings for spawning a standalone ZooKeeper test instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestingServerConfig {
    /// Launcher invoked as `<binary> start-foreground <zoo.cfg>`.
    #[serde(default = "default_binary")]
    pub binary: String,

    #[serde(default = "default_host")]
    pub host: String,

    /// `0` picks a free port when the instance is created.
    #[serde(default)]
    pub port: u16,

    #[serde(default = "default_tick_time_ms")]
    pub tick_time_ms: u32,

    #[serde(default = "default_startup_timeout", with = "duration_format")]
    pub startup_timeout: Duration,

    #[serde(default = "default_shutdown_timeout", with = "duration_format")]
    pub shutdown_timeout: Duration,

    /// Extra `zoo.cfg` entries, written in key order.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Default for TestingServerConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            host: default_host(),
            port: 0,
            tick_time_ms: default_tick_time_ms(),
            startup_timeout: default_startup_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
            properties: BTreeMap::new(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_binary() -> String {
    ZOOKEEPER_SERVER_BINARY.to_string()
}
fn default_host() -> String {
    LOOPBACK_HOSTNAME.to_string()
}
fn default_tick_time_ms() -> u32 {
    2000
}
fn default_startup_timeout() -> Duration {
    Duration::from_secs(30)
}
fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(10)
}

// ============================================
// IMPLEMENTATION
// ============================================

impl TestingServerConfig {
    /// Load config from `{config_dir}/zk-test-server.toml`.
    ///
    /// # Returns
    ///
    /// Returns `Ok(TestingServerConfig)` if loaded successfully, or defaults if the file is missing.
    /// Returns `Err(ConfigError)` if the file exists but cannot be read, parsed or validated.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: TestingServerConfig = toml::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config TOML: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Build config from defaults plus environment overrides.
    ///
    /// A `.env` file in the working directory (or a parent) is loaded first;
    /// its absence is not an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => debug!("No .env file found"),
            Err(e) => warn!("Ignoring unreadable .env file: {e}"),
        }

        let config = Self::default().with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `ZK_TEST_*` environment variables on top of this config.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(binary) = read_env(ENV_SERVER_BINARY) {
            debug!("{ENV_SERVER_BINARY} overrides binary: {binary}");
            self.binary = binary;
        }

        if let Some(host) = read_env(ENV_SERVER_HOST) {
            debug!("{ENV_SERVER_HOST} overrides host: {host}");
            self.host = host;
        }

        if let Some(raw) = read_env(ENV_SERVER_PORT) {
            self.port = raw
                .parse::<u16>()
                .map_err(|e| ConfigError::EnvironmentError {
                    location: ErrorLocation::from(Location::caller()),
                    variable: ENV_SERVER_PORT.to_string(),
                    reason: format!("'{raw}' is not a valid port: {e}"),
                })?;
        }

        if let Some(raw) = read_env(ENV_STARTUP_TIMEOUT) {
            self.startup_timeout =
                parse_duration(&raw).map_err(|e| ConfigError::EnvironmentError {
                    location: ErrorLocation::from(Location::caller()),
                    variable: ENV_STARTUP_TIMEOUT.to_string(),
                    reason: format!("'{raw}' is not a valid duration: {e}"),
                })?;
        }

        Ok(self)
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.binary.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "binary cannot be empty".to_string(),
            });
        }

        if self.host.is_empty() || self.host.contains(char::is_whitespace) || self.host.contains(':')
        {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!("Invalid host: '{}'", self.host),
            });
        }

        if self.tick_time_ms == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "tick_time_ms must be greater than zero".to_string(),
            });
        }

        if self.startup_timeout.is_zero() || self.shutdown_timeout.is_zero() {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "startup_timeout and shutdown_timeout must be non-zero".to_string(),
            });
        }

        for (key, value) in &self.properties {
            if RESERVED_PROPERTIES.contains(&key.as_str()) {
                return Err(ConfigError::ValidationError {
                    location: ErrorLocation::from(Location::caller()),
                    reason: format!("Property '{key}' is managed by the harness"),
                });
            }

            let malformed = key.trim().is_empty()
                || key.contains(['=', '\n', '\r'])
                || value.contains(['\n', '\r']);
            if malformed {
                return Err(ConfigError::ValidationError {
                    location: ErrorLocation::from(Location::caller()),
                    reason: format!("Invalid property entry: '{key}'"),
                });
            }
        }

        Ok(())
    }
}

fn read_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
