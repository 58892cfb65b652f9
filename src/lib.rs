//! freyr-agent
//!
//! Environmental telemetry agent for a small weather station. It reads a
//! temperature/pressure/humidity sensor on a fixed interval and publishes
//! each sample as JSON over MQTT, staying up through broker outages.
//!
//! # Overview
//!
//! - [`transport::mqtt::IotClient`] wraps rumqttc with a background network
//!   task, unbounded reconnects and lifecycle callbacks
//! - [`agent::SamplingLoop`] drives the sensor and publishes samples
//! - [`sensor`] has the Linux IIO backend and a simulated one
//! - [`config::AgentConfig`] is loaded once from TOML or JSON
//!
//! # Quick Start
//!
//! ```rust
//! use freyr_agent::sensor::SensorReading;
//! use freyr_agent::telemetry::TelemetrySample;
//!
//! let reading = SensorReading { temperature: 21.456, pressure: 1013.251, humidity: 47.89 };
//! let sample = TelemetrySample::now(&reading);
//! assert_eq!(sample.data.temperature, 21.5);
//! let payload = sample.to_json().unwrap();
//! assert!(payload.starts_with(b"{\"timestamp\":"));
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod observability;
pub mod sensor;
pub mod telemetry;
pub mod testing;
pub mod transport;

pub use agent::{SamplingLoop, StationListener};
pub use config::{AgentConfig, ConfigError};
pub use error::{AgentError, AgentResult};
pub use telemetry::TelemetrySample;
pub use transport::mqtt::{IotClient, IotEventListener, MessageId, MqttError, QoS};
