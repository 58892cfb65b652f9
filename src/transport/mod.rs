//! Transport layer for station telemetry
//!
//! The sampling loop talks to the broker through [`Transport`] so it can be
//! driven by a mock in tests.

pub mod mqtt;

use mqtt::{MessageId, QoS, Subscription};

/// Minimal publish/subscribe surface used by the agent
///
/// Both operations only enqueue work and never block on the network, so
/// they are safe to call from listener callbacks.
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Queue a message for delivery
    fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<MessageId, Self::Error>;

    /// Request subscriptions to the given topic filters
    fn subscribe(&self, subscriptions: Vec<Subscription>) -> Result<(), Self::Error>;

    /// Check if a CONNACK has been received on the current connection
    fn is_connected(&self) -> bool;
}
