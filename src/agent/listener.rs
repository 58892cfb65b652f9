//! Lifecycle listener installed by the station binary

use crate::transport::mqtt::{IotClient, IotEventListener, MessageId, Subscription};
use tracing::{debug, info, warn};

/// Logs connection events and restores the configured subscriptions after
/// every (re)connect, since the broker drops them with a clean session.
#[derive(Debug, Clone, Default)]
pub struct StationListener {
    subscriptions: Vec<Subscription>,
}

impl StationListener {
    pub fn new(subscriptions: Vec<Subscription>) -> Self {
        Self { subscriptions }
    }
}

impl IotEventListener for StationListener {
    fn on_connected(&self, client: &IotClient) {
        info!(client_id = %client.client_id(), "Connected to broker");

        if self.subscriptions.is_empty() {
            return;
        }
        match client.subscribe(self.subscriptions.clone()) {
            Ok(()) => debug!(count = self.subscriptions.len(), "Subscriptions restored"),
            Err(e) => warn!(error = %e, "Failed to restore subscriptions"),
        }
    }

    fn on_disconnected(&self, client: &IotClient) {
        warn!(
            state = ?client.connection_state(),
            "Disconnected from broker, reconnecting in background"
        );
    }

    fn on_message_published(
        &self,
        _client: &IotClient,
        message_id: MessageId,
        payload_size: Option<usize>,
    ) {
        match payload_size {
            Some(size) => debug!(%message_id, payload_size = size, "Delivery confirmed"),
            None => debug!(%message_id, "Duplicate delivery confirmation"),
        }
    }

    fn on_message_received(&self, _client: &IotClient, topic: &str, payload: &[u8]) {
        info!(
            topic = %topic,
            payload = %String::from_utf8_lossy(payload),
            "Message received"
        );
    }
}
