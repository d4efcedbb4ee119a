//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `bridge.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - BrokerConfig: MQTT broker address and the two topics.
//!     - ServerConfig: Where the websocket listener binds.
//!     - StoreConfig: Location of the sqlite telemetry database.
//!     - LoggingConfig: Log level and whether to log every reading.
//!
//! every section may be omitted; missing sections use the reference
//! deployment values.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// env var naming an explicit config file
pub const CONFIG_ENV: &str = "AQUAFEED_CONFIG";

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct BridgeConfig {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub sensor_topic: String,
    pub feed_topic: String,
    pub keep_alive_secs: u64,
    pub reconnect_delay_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "192.168.8.132".to_string(),
            port: 1883,
            client_id: "aquafeed-bridge".to_string(),
            sensor_topic: "sensor/data".to_string(),
            feed_topic: "feeder/control".to_string(),
            keep_alive_secs: 30,
            reconnect_delay_secs: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// frames queued per client before new ones are dropped
    pub client_outbox: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8081, client_outbox: 256 }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    /// sensor messages waiting for the persistence worker
    pub queue_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("data").join("telemetry.db"), queue_capacity: 256 }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_sensor_data: true }
    }
}

impl BridgeConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))
    }

    /// Load with default fallback.
    ///
    /// runs before logging is up, so it reports on stdout like the banner.
    pub fn load_or_default() -> Self {
        let mut paths = Vec::new();
        if let Ok(explicit) = std::env::var(CONFIG_ENV) {
            paths.push(PathBuf::from(explicit));
        }
        paths.push(PathBuf::from("config").join("bridge.toml"));
        paths.push(PathBuf::from("..").join("config").join("bridge.toml"));

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("┌─────────────────────────────────────────┐");
        println!("│          BRIDGE CONFIGURATION           │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Broker: {}:{}", self.broker.host, self.broker.port);
        println!("│ Sensor Topic: {}", self.broker.sensor_topic);
        println!("│ Feed Topic: {}", self.broker.feed_topic);
        println!("│ WebSocket: ws://{}", self.server.bind_addr());
        println!("│ Store: {}", self.store.path.display());
        println!("│ Log Level: {}", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}
