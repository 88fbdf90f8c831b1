//! Daemon configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (RCTRX_*)
//! - TOML configuration file

use anyhow::{Context, Result};
use rctrx_core::TransceiverConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Device backend configuration.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Signal engine configuration.
    #[serde(default)]
    pub engine: TransceiverConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Device backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Provide a receiver line.
    #[serde(default = "default_true")]
    pub receiver: bool,

    /// Provide a transmitter carrier channel.
    #[serde(default = "default_true")]
    pub transmitter: bool,

    /// Interval for synthetic demo frames on the receiver line, in
    /// milliseconds. Zero disables them.
    #[serde(default)]
    pub synthetic_frame_interval_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Port for the metrics HTTP endpoint.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    std::env::var("RCTRX_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

fn default_port() -> u16 {
    std::env::var("RCTRX_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(4222)
}

fn default_true() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            device: DeviceConfig::default(),
            engine: TransceiverConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            receiver: true,
            transmitter: true,
            synthetic_frame_interval_ms: 0,
        }
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "rctrx.toml",
            "/etc/rctrx/rctrx.toml",
            "~/.config/rctrx/rctrx.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Get the socket address to bind to.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Invalid host:port")
    }
}
