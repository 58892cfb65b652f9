//! Pure connection state management for the MQTT client
//!
//! This module contains the QoS and connection-state types, the reconnect
//! backoff policy and the translation from `AgentConfig` to rumqttc options.

use crate::config::AgentConfig;
use rumqttc::MqttOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Delivery guarantee for a publish or subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QoS {
    /// 0: fire and forget, no acknowledgment phase
    AtMostOnce,
    /// 1: acknowledged with PUBACK, may be delivered more than once
    AtLeastOnce,
    /// 2: four-way handshake ending in PUBCOMP
    ExactlyOnce,
}

impl QoS {
    /// Whether the broker confirms delivery for this level
    pub fn is_acknowledged(self) -> bool {
        !matches!(self, QoS::AtMostOnce)
    }
}

impl TryFrom<u8> for QoS {
    type Error = MqttError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(MqttError::InvalidQos(other)),
        }
    }
}

impl From<QoS> for u8 {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }
}

impl From<QoS> for rumqttc::QoS {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
            QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

impl From<rumqttc::QoS> for QoS {
    fn from(qos: rumqttc::QoS) -> Self {
        match qos {
            rumqttc::QoS::AtMostOnce => QoS::AtMostOnce,
            rumqttc::QoS::AtLeastOnce => QoS::AtLeastOnce,
            rumqttc::QoS::ExactlyOnce => QoS::ExactlyOnce,
        }
    }
}

impl fmt::Display for QoS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Connection state for the MQTT client
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Created, network task not started
    Idle,
    /// Network task started, waiting for the first ConnAck
    Connecting,
    /// ConnAck received, ready for operations
    Connected,
    /// Disconnected with reason
    Disconnected(String),
    /// Waiting to retry (attempt count)
    Reconnecting(u32),
}

/// Reconnection backoff. Attempts are never capped: the network task keeps
/// retrying until `disconnect()` is called.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Warm-up delays in milliseconds for the first attempts
    pub backoff_pattern: Vec<u64>,
    /// Delay to use after the pattern is exhausted
    pub sustained_delay: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            backoff_pattern: vec![250, 500, 1000, 2000],
            sustained_delay: 5000,
        }
    }
}

impl ReconnectConfig {
    /// Build a policy whose sustained delay is `retry_interval`; warm-up steps
    /// longer than that are dropped.
    pub fn with_retry_interval(retry_interval: Duration) -> Self {
        let sustained_delay = retry_interval.as_millis() as u64;
        let backoff_pattern = Self::default()
            .backoff_pattern
            .into_iter()
            .filter(|delay| *delay < sustained_delay)
            .collect();
        Self {
            backoff_pattern,
            sustained_delay,
        }
    }

    /// Calculate backoff delay for given attempt (1-based)
    pub fn calculate_backoff_delay(&self, attempt: u32) -> u64 {
        let index = attempt.saturating_sub(1) as usize;
        self.backoff_pattern
            .get(index)
            .copied()
            .unwrap_or(self.sustained_delay)
    }
}

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Not connected - current state: {state:?}")]
    NotConnected { state: ConnectionState },
    #[error("Request queue is full")]
    QueueFull,
    #[error("Request could not be queued")]
    RequestFailed(#[source] rumqttc::ClientError),
    #[error("Network task is already running")]
    AlreadyStarted,
    #[error("Event loop unavailable: {0}")]
    EventLoopUnavailable(String),
    #[error("Invalid QoS level: {0}")]
    InvalidQos(u8),
    #[error("Invalid publish topic: '{0}'")]
    InvalidTopic(String),
    #[error("Invalid topic filter: '{0}'")]
    InvalidTopicFilter(String),
}

impl MqttError {
    /// Transient failures can be retried by the caller once the connection
    /// recovers or the queue drains.
    pub fn is_transient(&self) -> bool {
        matches!(self, MqttError::NotConnected { .. } | MqttError::QueueFull)
    }
}

impl From<rumqttc::ClientError> for MqttError {
    fn from(error: rumqttc::ClientError) -> Self {
        match error {
            rumqttc::ClientError::TryRequest(_) => MqttError::QueueFull,
            other => MqttError::RequestFailed(other),
        }
    }
}

/// Pure function to configure MQTT options from config
pub fn configure_mqtt_options(config: &AgentConfig) -> MqttOptions {
    let mut mqtt_options =
        MqttOptions::new(config.client_id.clone(), config.endpoint.clone(), config.port);

    mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_s));
    // Broker-side subscriptions are rebuilt on every connect
    mqtt_options.set_clean_session(true);

    if !config.username.is_empty() {
        mqtt_options.set_credentials(config.username.clone(), config.password.clone());
    }

    mqtt_options
}
