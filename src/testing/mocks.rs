//! Mock implementations for testing
//!
//! Provides a recording transport, a recording lifecycle listener and a
//! scripted sensor so the agent can be exercised without a broker or
//! hardware.

use crate::sensor::{EnvironmentSensor, SensorError, SensorReading};
use crate::transport::mqtt::{
    ConnectionState, IotClient, IotEventListener, MessageId, MqttError, QoS, Subscription,
};
use crate::transport::Transport;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// A publish captured by [`MockTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub message_id: MessageId,
}

/// Mock transport for testing
#[derive(Debug)]
pub struct MockTransport {
    published: Mutex<Vec<PublishedMessage>>,
    subscribed: Mutex<Vec<Subscription>>,
    connected: AtomicBool,
    fail_publishes: AtomicBool,
    next_id: AtomicU64,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            subscribed: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            fail_publishes: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose publishes fail with `NotConnected`
    pub fn disconnected() -> Self {
        let transport = Self::default();
        transport.set_connected(false);
        transport
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make publishes fail with `QueueFull` while connected
    pub fn set_queue_full(&self, full: bool) {
        self.fail_publishes.store(full, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn subscribed(&self) -> Vec<Subscription> {
        self.subscribed.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear_history(&self) {
        self.published.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.subscribed.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Transport for MockTransport {
    type Error = MqttError;

    fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<MessageId, Self::Error> {
        if !self.is_connected() {
            return Err(MqttError::NotConnected {
                state: ConnectionState::Disconnected("mock offline".to_string()),
            });
        }
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(MqttError::QueueFull);
        }

        let message_id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.published.lock().unwrap_or_else(PoisonError::into_inner).push(PublishedMessage {
            topic: topic.to_string(),
            payload,
            qos,
            message_id,
        });
        Ok(message_id)
    }

    fn subscribe(&self, subscriptions: Vec<Subscription>) -> Result<(), Self::Error> {
        self.subscribed.lock().unwrap_or_else(PoisonError::into_inner).extend(subscriptions);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Lifecycle event captured by [`RecordingListener`]
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    Connected,
    Disconnected,
    Published {
        message_id: MessageId,
        payload_size: Option<usize>,
    },
    Received {
        topic: String,
        payload: Vec<u8>,
    },
}

/// Listener that records every callback in order
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn count(&self, wanted: fn(&ListenerEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| wanted(e))
            .count()
    }

    fn record(&self, event: ListenerEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}

impl IotEventListener for RecordingListener {
    fn on_connected(&self, _client: &IotClient) {
        self.record(ListenerEvent::Connected);
    }

    fn on_disconnected(&self, _client: &IotClient) {
        self.record(ListenerEvent::Disconnected);
    }

    fn on_message_published(
        &self,
        _client: &IotClient,
        message_id: MessageId,
        payload_size: Option<usize>,
    ) {
        self.record(ListenerEvent::Published {
            message_id,
            payload_size,
        });
    }

    fn on_message_received(&self, _client: &IotClient, topic: &str, payload: &[u8]) {
        self.record(ListenerEvent::Received {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
    }
}

/// Sensor that replays a fixed script, then repeats its fallback reading
#[derive(Debug, Clone)]
pub struct ScriptedSensor {
    script: Arc<Mutex<VecDeque<Result<SensorReading, String>>>>,
    fallback: SensorReading,
    reads: Arc<AtomicU64>,
}

impl ScriptedSensor {
    pub fn new(fallback: SensorReading) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback,
            reads: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn then_ok(self, reading: SensorReading) -> Self {
        self.script.lock().unwrap_or_else(PoisonError::into_inner).push_back(Ok(reading));
        self
    }

    pub fn then_fail(self, reason: &str) -> Self {
        self.script.lock().unwrap_or_else(PoisonError::into_inner).push_back(Err(reason.to_string()));
        self
    }

    /// A sensor whose first `times` reads fail
    pub fn failing_first(times: usize) -> Self {
        let sensor = Self::new(SensorReading {
            temperature: 0.0,
            pressure: 0.0,
            humidity: 0.0,
        });
        (0..times).fold(sensor, |sensor, _| sensor.then_fail("no response"))
    }

    /// Number of reads so far, shared between clones
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EnvironmentSensor for ScriptedSensor {
    async fn read(&mut self) -> Result<SensorReading, SensorError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(Ok(reading)) => Ok(reading),
            Some(Err(reason)) => Err(SensorError::Unavailable(reason)),
            None => Ok(self.fallback),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
