//! Connection lifecycle listener
//!
//! All callbacks run on the network task. A listener that blocks stalls
//! network processing, so implementations should hand heavy work off to
//! another task. Calling `publish` or `subscribe` from a callback is fine:
//! both only enqueue.

use super::client::IotClient;
use super::publish_tracker::MessageId;
use std::sync::Arc;

/// Receives connection lifecycle events from an [`IotClient`]
pub trait IotEventListener: Send + Sync {
    /// A CONNACK arrived. The client's subscription set is already empty.
    fn on_connected(&self, _client: &IotClient) {}

    /// The connection was lost or closed on request
    fn on_disconnected(&self, _client: &IotClient) {}

    /// The broker confirmed a QoS 1/2 publish. `payload_size` is `None` when
    /// no pending entry was left for `message_id`.
    fn on_message_published(
        &self,
        _client: &IotClient,
        _message_id: MessageId,
        _payload_size: Option<usize>,
    ) {
    }

    /// A message arrived on a subscribed topic
    fn on_message_received(&self, _client: &IotClient, _topic: &str, _payload: &[u8]) {}
}

/// Forwards every event to each inner listener in order
#[derive(Default, Clone)]
pub struct FanOutListener {
    listeners: Vec<Arc<dyn IotEventListener>>,
}

impl FanOutListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, listener: Arc<dyn IotEventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl IotEventListener for FanOutListener {
    fn on_connected(&self, client: &IotClient) {
        for listener in &self.listeners {
            listener.on_connected(client);
        }
    }

    fn on_disconnected(&self, client: &IotClient) {
        for listener in &self.listeners {
            listener.on_disconnected(client);
        }
    }

    fn on_message_published(
        &self,
        client: &IotClient,
        message_id: MessageId,
        payload_size: Option<usize>,
    ) {
        for listener in &self.listeners {
            listener.on_message_published(client, message_id, payload_size);
        }
    }

    fn on_message_received(&self, client: &IotClient, topic: &str, payload: &[u8]) {
        for listener in &self.listeners {
            listener.on_message_received(client, topic, payload);
        }
    }
}
