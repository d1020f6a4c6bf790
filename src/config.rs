//! Configuration types for Cadence

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::pacing::SpeedFactor;
use crate::{CadenceError, Result};

/// Port on which the broker is assumed to speak MQTT over TLS
pub const MQTT_TLS_PORT: u16 = 8883;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Broker connection settings
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Record source settings
    #[serde(default)]
    pub source: SourceConfig,
    /// Replay pacing settings
    #[serde(default)]
    pub replay: ReplayConfig,
}

/// MQTT broker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker hostname
    #[serde(default)]
    pub host: String,
    /// Broker port
    #[serde(default = "default_port")]
    pub port: u16,
    /// MQTT client identifier
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Username for credentialed connections
    #[serde(default)]
    pub username: Option<String>,
    /// Password for credentialed connections
    #[serde(default)]
    pub password: Option<String>,
    /// Quality of service level (0, 1 or 2)
    #[serde(default)]
    pub qos: u8,
    /// Publish with the retain flag set
    #[serde(default)]
    pub retain: bool,
    /// Force TLS on or off; unset means TLS on port 8883 only
    #[serde(default)]
    pub tls: Option<bool>,
    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

fn default_port() -> u16 {
    MQTT_TLS_PORT
}

fn default_client_id() -> String {
    "simple-replayer".to_string()
}

fn default_keep_alive() -> u64 {
    60
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            client_id: default_client_id(),
            username: None,
            password: None,
            qos: 0,
            retain: false,
            tls: None,
            keep_alive_secs: default_keep_alive(),
        }
    }
}

impl BrokerConfig {
    /// Whether the connection should be wrapped in TLS
    pub fn use_tls(&self) -> bool {
        self.tls.unwrap_or(self.port == MQTT_TLS_PORT)
    }
}

/// CSV record source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path to the CSV file
    #[serde(default)]
    pub path: PathBuf,
    /// Column holding the ISO 8601 timestamp
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,
    /// Column holding the topic
    #[serde(default = "default_topic_column")]
    pub topic_column: String,
    /// Column holding the payload
    #[serde(default = "default_payload_column")]
    pub payload_column: String,
    /// Topic used when the file has no topic column
    #[serde(default)]
    pub default_topic: Option<String>,
}

fn default_timestamp_column() -> String {
    "ts_iso".to_string()
}

fn default_topic_column() -> String {
    "topic".to_string()
}

fn default_payload_column() -> String {
    "payload_json".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            timestamp_column: default_timestamp_column(),
            topic_column: default_topic_column(),
            payload_column: default_payload_column(),
            default_topic: None,
        }
    }
}

/// Replay pacing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Time acceleration (1.0 = real time)
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Restart from the first record after the last one
    #[serde(default, rename = "loop")]
    pub loop_forever: bool,
    /// Stop looping after this many cycles
    #[serde(default)]
    pub max_cycles: Option<u64>,
    /// Log a progress line every N records
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,
    /// Print records instead of publishing them
    #[serde(default)]
    pub dry_run: bool,
}

fn default_speed() -> f64 {
    1.0
}

fn default_progress_every() -> u64 {
    1000
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            loop_forever: false,
            max_cycles: None,
            progress_every: default_progress_every(),
            dry_run: false,
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CadenceError::Config(format!("Failed to read config file: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| CadenceError::Config(format!("Failed to parse config: {e}")))
    }

    /// Validated speed factor
    ///
    /// # Errors
    ///
    /// Returns error if the speed is not strictly positive
    pub fn speed_factor(&self) -> Result<SpeedFactor> {
        SpeedFactor::new(self.replay.speed)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        self.speed_factor()?;

        if self.source.path.as_os_str().is_empty() {
            return Err(CadenceError::Config(
                "A CSV source path must be configured".to_string(),
            ));
        }

        for (name, column) in [
            ("timestamp_column", &self.source.timestamp_column),
            ("topic_column", &self.source.topic_column),
            ("payload_column", &self.source.payload_column),
        ] {
            if column.is_empty() {
                return Err(CadenceError::Config(format!("{name} cannot be empty")));
            }
        }

        if self.replay.progress_every == 0 {
            return Err(CadenceError::Config(
                "progress_every must be > 0".to_string(),
            ));
        }

        if self.replay.max_cycles == Some(0) {
            return Err(CadenceError::Config("max_cycles must be > 0".to_string()));
        }

        // Broker settings are irrelevant when nothing is sent
        if self.replay.dry_run {
            return Ok(());
        }

        if self.broker.host.is_empty() {
            return Err(CadenceError::Config(
                "Broker host must be configured".to_string(),
            ));
        }

        if self.broker.port == 0 {
            return Err(CadenceError::Config("Broker port cannot be 0".to_string()));
        }

        if self.broker.client_id.is_empty() {
            return Err(CadenceError::Config("client_id cannot be empty".to_string()));
        }

        if self.broker.qos > 2 {
            return Err(CadenceError::Config(format!(
                "Invalid QoS {}: expected 0, 1 or 2",
                self.broker.qos
            )));
        }

        if self.broker.password.is_some() && self.broker.username.is_none() {
            return Err(CadenceError::Config(
                "A password requires a username".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.broker.host = "broker.example.com".to_string();
        config.source.path = PathBuf::from("data.csv");
        config
    }

    #[test]
    fn test_config_parse() {
        let config_toml = r#"
            [broker]
            host = "broker.example.com"
            port = 1883
            username = "symbiotic"
            password = "secret"

            [source]
            path = "simple_day.csv"

            [replay]
            speed = 60.0
            loop = true
        "#;

        let config: Config = toml::from_str(config_toml).unwrap();
        assert_eq!(config.broker.host, "broker.example.com");
        assert_eq!(config.broker.client_id, "simple-replayer");
        assert!(!config.broker.use_tls());
        assert_eq!(config.source.timestamp_column, "ts_iso");
        assert!(config.replay.loop_forever);
        assert!((config.replay.speed - 60.0).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        let config_toml = r#"
            [broker]
            host = "localhost"

            [source]
            path = "/tmp/data.csv"
        "#;
        file.write_all(config_toml.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.broker.port, MQTT_TLS_PORT);
        assert!(config.broker.use_tls());
        assert_eq!(config.replay.progress_every, 1000);
    }

    #[test]
    fn test_invalid_speed() {
        for speed in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let mut config = valid_config();
            config.replay.speed = speed;
            assert!(matches!(config.validate(), Err(CadenceError::Config(_))));
        }
    }

    #[test]
    fn test_missing_host() {
        let mut config = valid_config();
        config.broker.host.clear();
        assert!(config.validate().is_err());

        config.replay.dry_run = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_broker_settings() {
        let mut config = valid_config();
        config.broker.qos = 3;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.broker.password = Some("secret".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tls_override() {
        let mut broker = BrokerConfig::default();
        broker.tls = Some(false);
        assert!(!broker.use_tls());

        broker.port = 1883;
        broker.tls = Some(true);
        assert!(broker.use_tls());
    }
}
