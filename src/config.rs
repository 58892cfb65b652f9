//! Agent configuration
//!
//! The connection keys mirror the field-device config file: every broker key
//! is required and a missing one is a fatal startup error. Sampling, sensor
//! and reconnect tuning live in optional sections with defaults.

use crate::transport::mqtt::{QoS, Subscription};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Top-level agent configuration, loaded once at startup
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    /// Broker host name or address
    pub endpoint: String,
    /// Broker TCP port
    pub port: u16,
    /// MQTT client identifier
    pub client_id: String,
    /// Reserved for TLS, not used by the transport yet
    pub ca_path: PathBuf,
    pub certificate_path: PathBuf,
    pub private_key_path: PathBuf,
    pub username: String,
    pub password: String,
    /// Budget for `IotClient::disconnect` to let the network task finish
    pub disconnect_timeout_s: u64,
    /// Passed through to the network layer as the connection timeout
    pub operation_timeout_s: u64,

    /// MQTT keep-alive interval (default: 120)
    #[serde(default = "default_keep_alive")]
    pub keep_alive_s: u64,
    /// Delay between reconnection attempts once the warm-up backoff is spent (default: 5)
    #[serde(default = "default_retry_interval")]
    pub retry_interval_s: u64,
    /// Depth of the outgoing request queue (default: 10)
    #[serde(default = "default_request_capacity")]
    pub request_capacity: usize,
    /// Topic filters re-subscribed after every (re)connection
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionConfig>,

    #[serde(default)]
    pub sampling: SamplingSection,
    #[serde(default)]
    pub sensor: SensorSection,
}

/// One configured subscription
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionConfig {
    pub topic: String,
    #[serde(default = "default_subscription_qos")]
    pub qos: QoS,
}

impl From<&SubscriptionConfig> for Subscription {
    fn from(config: &SubscriptionConfig) -> Self {
        Subscription::new(config.topic.clone(), config.qos)
    }
}

/// Sampling loop settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SamplingSection {
    /// Topic samples are published to
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Seconds between samples (default: 30)
    #[serde(default = "default_interval")]
    pub interval_s: u64,
    /// Delivery guarantee for samples (default: 1)
    #[serde(default = "default_sampling_qos")]
    pub qos: QoS,
    /// Consecutive sensor failures tolerated before the loop gives up (default: 5)
    #[serde(default = "default_max_failures")]
    pub max_consecutive_failures: u32,
}

impl Default for SamplingSection {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            interval_s: default_interval(),
            qos: default_sampling_qos(),
            max_consecutive_failures: default_max_failures(),
        }
    }
}

/// Which sensor backend to read
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    /// Linux IIO sysfs device (e.g. the kernel bme280 driver)
    Iio,
    /// Synthetic values for bench testing without hardware
    Simulated,
}

/// Sensor settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorSection {
    #[serde(default = "default_sensor_kind")]
    pub kind: SensorKind,
    /// IIO device directory
    #[serde(default = "default_sensor_device")]
    pub device: PathBuf,
}

impl Default for SensorSection {
    fn default() -> Self {
        Self {
            kind: default_sensor_kind(),
            device: default_sensor_device(),
        }
    }
}

fn default_keep_alive() -> u64 {
    120
}

fn default_retry_interval() -> u64 {
    5
}

fn default_request_capacity() -> usize {
    10
}

fn default_subscription_qos() -> QoS {
    QoS::AtLeastOnce
}

fn default_topic() -> String {
    "sensors/freyr".to_string()
}

fn default_interval() -> u64 {
    30
}

fn default_sampling_qos() -> QoS {
    QoS::AtLeastOnce
}

fn default_max_failures() -> u32 {
    5
}

fn default_sensor_kind() -> SensorKind {
    SensorKind::Iio
}

fn default_sensor_device() -> PathBuf {
    PathBuf::from("/sys/bus/iio/devices/iio:device0")
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AgentConfig {
    /// Load configuration from a TOML file, or JSON when the extension is `.json`
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let config = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_toml_str(&content)?
        };

        info!(path = %path.display(), endpoint = %config.endpoint, port = config.port, "Configuration loaded");
        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AgentConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate JSON text
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: AgentConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the agent unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "endpoint must not be empty".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "port must be greater than 0".to_string(),
            ));
        }
        validate_client_id(&self.client_id)?;
        if self.sampling.interval_s == 0 {
            return Err(ConfigError::InvalidConfig(
                "sampling.interval_s must be greater than 0".to_string(),
            ));
        }
        if self.keep_alive_s < 5 {
            return Err(ConfigError::InvalidConfig(
                "keep_alive_s must be at least 5 seconds".to_string(),
            ));
        }
        if self.retry_interval_s == 0 {
            return Err(ConfigError::InvalidConfig(
                "retry_interval_s must be greater than 0".to_string(),
            ));
        }
        if let Some(bad) = self
            .subscriptions
            .iter()
            .find(|s| !rumqttc::valid_filter(&s.topic))
        {
            return Err(ConfigError::InvalidConfig(format!(
                "subscription filter '{}' is not a valid topic filter",
                bad.topic
            )));
        }
        if self.request_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "request_capacity must be greater than 0".to_string(),
            ));
        }
        if self.sampling.topic.is_empty() || self.sampling.topic.contains(|c| c == '+' || c == '#') {
            return Err(ConfigError::InvalidConfig(format!(
                "sampling.topic '{}' is not a valid publish topic",
                self.sampling.topic
            )));
        }

        debug!(
            ca_path = %self.ca_path.display(),
            certificate_path = %self.certificate_path.display(),
            private_key_path = %self.private_key_path.display(),
            "TLS paths recorded but not applied"
        );
        Ok(())
    }

    /// Subscriptions to restore after each connection
    pub fn subscription_list(&self) -> Vec<Subscription> {
        self.subscriptions.iter().map(Subscription::from).collect()
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
endpoint = "localhost"
port = 1883
client_id = "test-station"
ca_path = "/etc/freyr/ca.pem"
certificate_path = "/etc/freyr/cert.pem"
private_key_path = "/etc/freyr/key.pem"
username = "station"
password = "hunter2"
disconnect_timeout_s = 10
operation_timeout_s = 5
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("endpoint", &self.endpoint)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("ca_path", &self.ca_path)
            .field("certificate_path", &self.certificate_path)
            .field("private_key_path", &self.private_key_path)
            .field("username", &self.username)
            .field("password", &"***")
            .field("disconnect_timeout_s", &self.disconnect_timeout_s)
            .field("operation_timeout_s", &self.operation_timeout_s)
            .field("keep_alive_s", &self.keep_alive_s)
            .field("retry_interval_s", &self.retry_interval_s)
            .field("request_capacity", &self.request_capacity)
            .field("subscriptions", &self.subscriptions)
            .field("sampling", &self.sampling)
            .field("sensor", &self.sensor)
            .finish()
    }
}

/// MQTT 3.1.1 allows up to 23 bytes; brokers commonly accept more, so only
/// emptiness and control characters are rejected here.
fn validate_client_id(client_id: &str) -> Result<(), ConfigError> {
    if client_id.is_empty() || client_id.chars().any(char::is_control) {
        return Err(ConfigError::InvalidConfig(format!(
            "client_id '{client_id}' must be non-empty printable text"
        )));
    }
    Ok(())
}
