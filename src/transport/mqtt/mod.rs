//! MQTT client wrapper for the station
//!
//! Pure pieces are kept apart from the I/O coordinator so they can be tested
//! without a broker:
//!
//! - [`connection`] - QoS, connection state, options and errors
//! - [`message_handler`] - routing of raw rumqttc events
//! - [`health_monitor`] - state transitions and reconnect backoff
//! - [`subscriptions`] - the deduplicated subscription set
//! - [`publish_tracker`] - message ids and pending acknowledgments
//! - [`listener`] - lifecycle callbacks
//! - [`client`] - the [`IotClient`] handle and its network task
//!
//! # Usage
//!
//! ```rust,no_run
//! use freyr_agent::config::AgentConfig;
//! use freyr_agent::transport::mqtt::{IotClient, QoS};
//! use std::time::Duration;
//!
//! # async fn run(config: AgentConfig) -> Result<(), Box<dyn std::error::Error>> {
//! let client = IotClient::new(&config);
//! client.connect()?;
//! client.wait_until_connected(Duration::from_secs(10)).await?;
//! client.publish("sensors/freyr", br#"{"temperature":21.5}"#.to_vec(), QoS::AtLeastOnce)?;
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod connection;
pub mod health_monitor;
pub mod listener;
pub mod message_handler;
pub mod publish_tracker;
pub mod subscriptions;

pub use client::IotClient;
pub use connection::{configure_mqtt_options, ConnectionState, MqttError, QoS, ReconnectConfig};
pub use health_monitor::{ConnectionEvent, HealthMonitor, ReconnectionDecision};
pub use listener::{FanOutListener, IotEventListener};
pub use message_handler::{EventRoute, MessageHandler};
pub use publish_tracker::{Acknowledged, MessageId, PublishTracker};
pub use subscriptions::{Subscription, SubscriptionSet};
