//! Declarative configuration loading from YAML, TOML, and environment variables.
//!
//! Mirror structs deserialized with serde are converted into the programmatic
//! [`ClientConfig`](crate::config::ClientConfig) through its builder, so every
//! source goes through the same validation.
//!
//! # Supported Formats
//!
//! - **YAML** (requires `config-file` feature): `ClientConfig::from_yaml("widerow.yaml")`
//! - **TOML** (requires `config-file` feature): `ClientConfig::from_toml("widerow.toml")`
//! - **Environment Variables** (always available): `ClientConfig::from_env()`
//!
//! # Example YAML
//!
//! ```yaml
//! consistency-level: quorum
//! pool:
//!   addresses:
//!     - "10.0.0.1:9160"
//!     - "10.0.0.2"
//!   clock-resolution: microseconds-sync
//!   load-balancing: random
//! failover:
//!   preset: try-all
//!   write-retries: 1
//!   retry-pause-ms: 50
//!   jitter: 0.2
//!   retryable:
//!     - unavailable
//!     - timeout
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use widerow_core::{ConsistencyLevel, ErrorKind};

use crate::config::{ClientConfig, ClientConfigBuilder, ConfigError, FailoverPolicy, LoadBalancing};
use crate::connection::ClockResolution;

/// Port appended to addresses given without one.
const DEFAULT_PORT: u16 = 9160;

/// Top-level file-based configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileConfig {
    /// Consistency level name, e.g. `"one"` or `"quorum"`.
    pub consistency_level: Option<String>,
    /// Connection pool configuration.
    pub pool: Option<FilePoolConfig>,
    /// Failover configuration.
    pub failover: Option<FileFailoverConfig>,
}

/// File-based pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct FilePoolConfig {
    /// Server addresses; the port defaults to 9160.
    pub addresses: Option<Vec<String>>,
    /// Clock resolution: `seconds`, `milliseconds`, `microseconds` or `microseconds-sync`.
    pub clock_resolution: Option<String>,
    /// Host selection: `round-robin` or `random`.
    pub load_balancing: Option<String>,
}

/// File-based failover configuration.
///
/// Explicit settings override those of `preset`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileFailoverConfig {
    /// Named policy: `fail-fast`, `try-one-next` or `try-all`.
    pub preset: Option<String>,
    /// Retry budget for reads.
    pub read_retries: Option<u32>,
    /// Retry budget for writes.
    pub write_retries: Option<u32>,
    /// Pause between attempts in milliseconds.
    pub retry_pause_ms: Option<u64>,
    /// Jitter factor (0.0 to 1.0).
    pub jitter: Option<f64>,
    /// Error kinds that trigger a retry.
    pub retryable: Option<Vec<String>>,
}

fn parse_address(value: &str) -> Result<SocketAddr, ConfigError> {
    let value = value.trim();
    value
        .parse::<SocketAddr>()
        .or_else(|_| format!("{value}:{DEFAULT_PORT}").parse::<SocketAddr>())
        .map_err(|_| ConfigError::new(format!("invalid address: {value}")))
}

fn parse_preset(value: &str) -> Result<FailoverPolicy, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "fail-fast" => Ok(FailoverPolicy::fail_fast()),
        "try-one-next" | "on-fail-try-one-next-available" => {
            Ok(FailoverPolicy::on_fail_try_one_next_available())
        }
        "try-all" | "on-fail-try-all-available" => Ok(FailoverPolicy::on_fail_try_all_available()),
        other => Err(ConfigError::new(format!("unknown failover preset: {other}"))),
    }
}

impl TryFrom<FileConfig> for ClientConfig {
    type Error = ConfigError;

    fn try_from(file: FileConfig) -> Result<Self, Self::Error> {
        let mut builder = ClientConfigBuilder::new();

        if let Some(level) = file.consistency_level {
            let level = level.parse::<ConsistencyLevel>().map_err(ConfigError::new)?;
            builder = builder.consistency_level(level);
        }

        if let Some(pool) = file.pool {
            if let Some(addrs) = pool.addresses {
                let addresses = addrs
                    .iter()
                    .map(|a| parse_address(a))
                    .collect::<Result<Vec<_>, _>>()?;
                builder = builder.addresses(addresses);
            }

            if let Some(resolution) = pool.clock_resolution {
                let resolution = resolution
                    .parse::<ClockResolution>()
                    .map_err(ConfigError::new)?;
                builder = builder.pool(|p| p.clock_resolution(resolution));
            }

            if let Some(strategy) = pool.load_balancing {
                let strategy = strategy.parse::<LoadBalancing>().map_err(ConfigError::new)?;
                builder = builder.pool(|p| p.load_balancing(strategy));
            }
        }

        if let Some(failover) = file.failover {
            if let Some(preset) = failover.preset {
                builder = builder.failover_policy(parse_preset(&preset)?);
            }

            let retryable = failover
                .retryable
                .map(|kinds| {
                    kinds
                        .iter()
                        .map(|k| k.parse::<ErrorKind>().map_err(ConfigError::new))
                        .collect::<Result<Vec<_>, _>>()
                })
                .transpose()?;

            builder = builder.failover(|mut f| {
                if let Some(n) = failover.read_retries {
                    f = f.read_retries(n);
                }
                if let Some(n) = failover.write_retries {
                    f = f.write_retries(n);
                }
                if let Some(ms) = failover.retry_pause_ms {
                    f = f.retry_pause(Duration::from_millis(ms));
                }
                if let Some(j) = failover.jitter {
                    f = f.jitter(j);
                }
                if let Some(kinds) = retryable {
                    f = f.retryable(kinds);
                }
                f
            });
        }

        builder.build()
    }
}

impl ClientConfig {
    /// Loads configuration from a YAML file.
    ///
    /// Requires the `config-file` feature.
    #[cfg(feature = "config-file")]
    pub fn from_yaml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::new(format!("failed to read YAML config file: {e}"))
        })?;
        let file_config: FileConfig = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::new(format!("failed to parse YAML config: {e}"))
        })?;
        file_config.try_into()
    }

    /// Loads configuration from a TOML file.
    ///
    /// Requires the `config-file` feature.
    #[cfg(feature = "config-file")]
    pub fn from_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::new(format!("failed to read TOML config file: {e}"))
        })?;
        let file_config: FileConfig = toml_crate::from_str(&content).map_err(|e| {
            ConfigError::new(format!("failed to parse TOML config: {e}"))
        })?;
        file_config.try_into()
    }

    /// Loads configuration from environment variables.
    ///
    /// | Variable | Maps to |
    /// |----------|---------|
    /// | `WIDEROW_ADDRESSES` | Comma-separated addresses (e.g., `10.0.0.1:9160,10.0.0.2:9160`) |
    /// | `WIDEROW_CONSISTENCY_LEVEL` | Consistency level name |
    /// | `WIDEROW_CLOCK_RESOLUTION` | Clock resolution name |
    /// | `WIDEROW_LOAD_BALANCING` | `round-robin` or `random` |
    /// | `WIDEROW_FAILOVER` | Failover preset name |
    /// | `WIDEROW_READ_RETRIES` | Retry budget for reads |
    /// | `WIDEROW_WRITE_RETRIES` | Retry budget for writes |
    /// | `WIDEROW_RETRY_PAUSE_MS` | Pause between attempts in milliseconds |
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut file_config = FileConfig::default();

        if let Ok(val) = std::env::var("WIDEROW_ADDRESSES") {
            file_config.pool.get_or_insert_with(Default::default).addresses = Some(
                val.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            );
        }

        if let Ok(val) = std::env::var("WIDEROW_CONSISTENCY_LEVEL") {
            file_config.consistency_level = Some(val);
        }

        if let Ok(val) = std::env::var("WIDEROW_CLOCK_RESOLUTION") {
            file_config
                .pool
                .get_or_insert_with(Default::default)
                .clock_resolution = Some(val);
        }

        if let Ok(val) = std::env::var("WIDEROW_LOAD_BALANCING") {
            file_config
                .pool
                .get_or_insert_with(Default::default)
                .load_balancing = Some(val);
        }

        if let Ok(val) = std::env::var("WIDEROW_FAILOVER") {
            file_config.failover.get_or_insert_with(Default::default).preset = Some(val);
        }

        if let Ok(val) = std::env::var("WIDEROW_READ_RETRIES") {
            if let Ok(n) = val.parse::<u32>() {
                file_config
                    .failover
                    .get_or_insert_with(Default::default)
                    .read_retries = Some(n);
            }
        }

        if let Ok(val) = std::env::var("WIDEROW_WRITE_RETRIES") {
            if let Ok(n) = val.parse::<u32>() {
                file_config
                    .failover
                    .get_or_insert_with(Default::default)
                    .write_retries = Some(n);
            }
        }

        if let Ok(val) = std::env::var("WIDEROW_RETRY_PAUSE_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                file_config
                    .failover
                    .get_or_insert_with(Default::default)
                    .retry_pause_ms = Some(ms);
            }
        }

        file_config.try_into()
    }
}

/// Loads a configuration file, picking the format from its extension.
///
/// Supports `.yaml`, `.yml`, and `.toml`. Requires the `config-file` feature.
#[cfg(feature = "config-file")]
pub fn load_config<P: AsRef<std::path::Path>>(path: P) -> Result<ClientConfig, ConfigError> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => ClientConfig::from_yaml(path),
        Some("toml") => ClientConfig::from_toml(path),
        Some(ext) => Err(ConfigError::new(format!(
            "unsupported config file extension: .{ext} (expected .yaml, .yml, or .toml)"
        ))),
        None => Err(ConfigError::new(
            "config file has no extension; expected .yaml, .yml, or .toml",
        )),
    }
}
