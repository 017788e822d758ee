use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// aisstream.io API key, passed through to the subscription message.
    pub api_key: String,
    /// Verbose logging toggle.
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub logging: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// WebSocket endpoint of the AIS feed
    pub url: String,
    /// Seconds to wait before reconnecting after a transport failure
    pub reconnect_seconds: u64,
    /// Subscription bounding box: [[lat_min, lon_min], [lat_max, lon_max]]
    pub bounding_box: [[f64; 2]; 2],
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: "wss://stream.aisstream.io/v0/stream".to_string(),
            reconnect_seconds: 10,
            // Trollhättan canal corridor
            bounding_box: [[58.26, 12.23], [58.36, 12.34]],
        }
    }
}

impl StreamConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self { enabled: true, port: 8180 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Directory where log files will be stored
    pub directory: String,
    /// Log file name prefix (date will be appended)
    pub file_prefix: String,
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directory: "./logs".to_string(),
            file_prefix: "bridge_monitor".to_string(),
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_key: String::new(),
            debug: false,
            stream: StreamConfig::default(),
            web: WebConfig::default(),
            logging: LogConfig::default(),
        }
    }
}
