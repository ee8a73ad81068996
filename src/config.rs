//! Configuration management for Capacitor.
//!
//! Configuration is layered: built-in defaults, then an optional YAML file,
//! then `CAPACITOR_`-prefixed environment variables using `__` to separate
//! nested keys (e.g. `CAPACITOR_SERVER__GRPC_ADDR=0.0.0.0:8081`).

use std::net::SocketAddr;
use std::path::Path;

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File, FileFormat};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bucket::amount;
use crate::bucket::BucketId;
use crate::error::{CapacitorError, Result};

/// Main configuration for the Capacitor service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapacitorConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Buckets created at startup
    #[serde(default)]
    pub buckets: Vec<BucketSpec>,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// gRPC server address
    #[serde(default = "default_grpc_addr")]
    pub grpc_addr: SocketAddr,

    /// Events buffered per `WatchEvents` subscriber before it starts lagging
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            grpc_addr: default_grpc_addr(),
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_grpc_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8081))
}

fn default_event_buffer() -> usize {
    1024
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `capacitor=debug`. `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// A bucket declared in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSpec {
    /// 32-byte id as 64 hex digits
    pub id: BucketId,

    /// Capacity limit, as an integer or a decimal string for values past 64 bits
    #[serde(
        deserialize_with = "amount::deserialize_decimal",
        serialize_with = "amount::serialize_decimal"
    )]
    pub limit: U256,

    /// Seconds to fully recover; zero for an unlimited bucket
    #[serde(default)]
    pub duration: u64,
}

impl CapacitorConfig {
    /// Load configuration from an optional YAML file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
        }

        let builder = builder.add_source(
            Environment::with_prefix("CAPACITOR")
                .prefix_separator("_")
                .separator("__"),
        );
        Self::build(builder)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::build(config::Config::builder().add_source(File::from_str(yaml, FileFormat::Yaml)))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        builder
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| CapacitorError::Config(e.to_string()))
    }
}
