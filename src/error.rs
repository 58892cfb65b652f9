//! Top-level error type for the station agent
//!
//! Each subsystem keeps its own error enum; `AgentError` is what reaches
//! `main` and decides the exit status.

use crate::config::ConfigError;
use crate::sensor::SensorError;
use crate::transport::mqtt::MqttError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] MqttError),

    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Signal handling error: {0}")]
    Signal(#[source] std::io::Error),
}

pub type AgentResult<T> = Result<T, AgentError>;
