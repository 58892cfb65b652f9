//! Reconnect-aware MQTT client wrapper
//!
//! `IotClient` owns the rumqttc handle and a background network task. The
//! task polls the event loop, reconnects after failures and turns every
//! event into at most one listener callback. Caller-facing operations never
//! wait on the network: they only enqueue requests.

use super::connection::{configure_mqtt_options, ConnectionState, MqttError, QoS, ReconnectConfig};
use super::health_monitor::{ConnectionEvent, HealthMonitor, ReconnectionDecision};
use super::listener::IotEventListener;
use super::message_handler::{EventRoute, MessageHandler};
use super::publish_tracker::{MessageId, PublishTracker};
use super::subscriptions::{Subscription, SubscriptionSet};
use crate::config::AgentConfig;
use crate::transport::Transport;
use rumqttc::{AsyncClient, Event, EventLoop, NetworkOptions};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn, Instrument};

/// Handle to one logical broker connection. Clones share the connection.
#[derive(Clone)]
pub struct IotClient {
    inner: Arc<Inner>,
}

struct Inner {
    client_id: String,
    client: AsyncClient,
    event_loop: Mutex<Option<EventLoop>>,
    network_task: Mutex<Option<JoinHandle<EventLoop>>>,
    state_tx: watch::Sender<ConnectionState>,
    shutdown_tx: watch::Sender<bool>,
    subscriptions: Mutex<SubscriptionSet>,
    publishes: Mutex<PublishTracker>,
    listener: RwLock<Option<Arc<dyn IotEventListener>>>,
    reconnect_config: ReconnectConfig,
    disconnect_timeout: Duration,
}

/// Critical sections never await, so a poisoned lock still holds consistent data
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl IotClient {
    /// Build the client. No network activity happens until [`connect`](Self::connect).
    pub fn new(config: &AgentConfig) -> Self {
        let mqtt_options = configure_mqtt_options(config);
        let (client, mut event_loop) = AsyncClient::new(mqtt_options, config.request_capacity);

        let mut network_options = NetworkOptions::new();
        network_options.set_connection_timeout(config.operation_timeout_s);
        event_loop.set_network_options(network_options);

        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let (shutdown_tx, _) = watch::channel(false);

        IotClient {
            inner: Arc::new(Inner {
                client_id: config.client_id.clone(),
                client,
                event_loop: Mutex::new(Some(event_loop)),
                network_task: Mutex::new(None),
                state_tx,
                shutdown_tx,
                subscriptions: Mutex::new(SubscriptionSet::new()),
                publishes: Mutex::new(PublishTracker::new()),
                listener: RwLock::new(None),
                reconnect_config: ReconnectConfig::with_retry_interval(Duration::from_secs(
                    config.retry_interval_s,
                )),
                disconnect_timeout: Duration::from_secs(config.disconnect_timeout_s),
            }),
        }
    }

    /// Install the lifecycle listener, replacing any previous one.
    /// With `None`, events are dropped.
    pub fn set_listener(&self, listener: Option<Arc<dyn IotEventListener>>) {
        *self
            .inner
            .listener
            .write()
            .unwrap_or_else(PoisonError::into_inner) = listener;
    }

    pub fn client_id(&self) -> &str {
        &self.inner.client_id
    }

    /// Start the background network task. Returns immediately; connection
    /// progress is reported through the listener.
    pub fn connect(&self) -> Result<(), MqttError> {
        let mut task_slot = lock(&self.inner.network_task);
        if task_slot.is_some() {
            return Err(MqttError::AlreadyStarted);
        }

        let event_loop = lock(&self.inner.event_loop).take().ok_or_else(|| {
            MqttError::EventLoopUnavailable("event loop was lost by an aborted network task".to_string())
        })?;

        self.inner.shutdown_tx.send_replace(false);
        self.transition(ConnectionEvent::Started);

        let client = self.clone();
        *task_slot = Some(tokio::spawn(client.run_network_loop(event_loop)));

        info!(client_id = %self.inner.client_id, "MQTT network task started");
        Ok(())
    }

    /// Close the session and stop the network task. Best effort: in-flight
    /// publishes are abandoned, and a task that does not stop within the
    /// disconnect timeout is aborted.
    pub async fn disconnect(&self) -> Result<(), MqttError> {
        let Some(mut handle) = lock(&self.inner.network_task).take() else {
            debug!("Disconnect requested but network task is not running");
            return Ok(());
        };

        if self.is_connected() {
            if let Err(e) = self.inner.client.try_disconnect() {
                warn!(error = %e, "Failed to queue DISCONNECT");
            }
        }
        self.inner.shutdown_tx.send_replace(true);

        let result = match tokio::time::timeout(self.inner.disconnect_timeout, &mut handle).await {
            Ok(Ok(event_loop)) => {
                *lock(&self.inner.event_loop) = Some(event_loop);
                info!("Network task shut down gracefully");
                Ok(())
            }
            Ok(Err(e)) => Err(MqttError::EventLoopUnavailable(format!(
                "network task failed: {e}"
            ))),
            Err(_) => {
                warn!(
                    timeout_s = self.inner.disconnect_timeout.as_secs(),
                    "Network task didn't stop in time, aborting"
                );
                handle.abort();
                Err(MqttError::EventLoopUnavailable(
                    "network task aborted after disconnect timeout".to_string(),
                ))
            }
        };

        if self.is_connected() {
            self.handle_connection_lost(ConnectionEvent::DisconnectRequested);
        }
        self.transition(ConnectionEvent::Stopped);
        info!(client_id = %self.inner.client_id, "MQTT client disconnected");
        result
    }

    /// Queue a publish. Returns as soon as the request is queued; delivery
    /// is confirmed later through `on_message_published` (QoS 1/2 only).
    pub fn publish(
        &self,
        topic: &str,
        payload: impl Into<Vec<u8>>,
        qos: QoS,
    ) -> Result<MessageId, MqttError> {
        let state = self.connection_state();
        if !HealthMonitor::can_publish(&state) {
            return Err(MqttError::NotConnected { state });
        }

        if topic.is_empty() || !rumqttc::valid_topic(topic) {
            return Err(MqttError::InvalidTopic(topic.to_string()));
        }

        let payload = payload.into();
        let payload_size = payload.len();

        // Held across try_publish so the network task cannot see the packet
        // go out before the submission is registered
        let mut publishes = lock(&self.inner.publishes);
        self.inner
            .client
            .try_publish(topic, qos.into(), false, payload)?;
        let message_id = publishes.register(qos, payload_size);

        debug!(topic = %topic, %message_id, %qos, payload_size, "Publish queued");
        Ok(message_id)
    }

    /// Track the filters not already subscribed and send one SUBSCRIBE for
    /// the whole accumulated set. A batch holding a malformed filter is
    /// refused before anything is tracked.
    pub fn subscribe<I>(&self, subscriptions: I) -> Result<(), MqttError>
    where
        I: IntoIterator<Item = Subscription>,
    {
        let subscriptions: Vec<Subscription> = subscriptions.into_iter().collect();
        if let Some(bad) = subscriptions
            .iter()
            .find(|s| !rumqttc::valid_filter(&s.topic_filter))
        {
            return Err(MqttError::InvalidTopicFilter(bad.topic_filter.clone()));
        }

        let mut set = lock(&self.inner.subscriptions);
        let added = set.extend_new(subscriptions);
        if set.is_empty() {
            return Ok(());
        }

        self.inner.client.try_subscribe_many(set.to_filters())?;
        info!(added, total = set.len(), "Subscription request queued");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        matches!(*self.inner.state_tx.borrow(), ConnectionState::Connected)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.state_tx.borrow().clone()
    }

    /// Snapshot of the tracked subscriptions
    pub fn subscriptions(&self) -> Vec<Subscription> {
        lock(&self.inner.subscriptions).entries().to_vec()
    }

    /// QoS 1/2 publishes still waiting for acknowledgment
    pub fn pending_publishes(&self) -> usize {
        lock(&self.inner.publishes).pending()
    }

    /// Wait until a CONNACK has been received
    pub async fn wait_until_connected(&self, timeout: Duration) -> Result<(), MqttError> {
        let mut state_rx = self.inner.state_tx.subscribe();
        let waited = tokio::time::timeout(timeout, async {
            state_rx
                .wait_for(|state| matches!(state, ConnectionState::Connected))
                .await
                .map(|_| ())
        })
        .await;

        match waited {
            Ok(Ok(())) => Ok(()),
            _ => Err(MqttError::NotConnected {
                state: self.connection_state(),
            }),
        }
    }

    /// Apply one network event: update state and bookkeeping, then notify
    /// the listener. The network task calls this for every polled event.
    pub fn dispatch_event(&self, event: &Event) -> EventRoute {
        let route = MessageHandler::route_mqtt_event(event);

        match &route {
            EventRoute::ConnectionAcknowledged { session_present } => {
                // Broker-side subscriptions do not survive a reconnect
                lock(&self.inner.subscriptions).clear();
                self.transition(ConnectionEvent::ConnAckReceived);
                debug!(session_present, "ConnAck received");
                self.notify(|listener, client| listener.on_connected(client));
            }
            EventRoute::ConnectionRefused(reason) => {
                self.handle_connection_lost(ConnectionEvent::NetworkError(format!(
                    "Connection refused: {reason}"
                )));
            }
            EventRoute::MessageReceived { topic, payload } => {
                debug!(topic = %topic, size = payload.len(), "Message received");
                self.notify(|listener, client| listener.on_message_received(client, topic, payload));
            }
            EventRoute::PublishSent { packet_id } => {
                let bound = lock(&self.inner.publishes).bind_outgoing(*packet_id);
                match bound {
                    Some(message_id) => trace!(packet_id, %message_id, "Publish sent"),
                    None => debug!(packet_id, "Publish retransmitted"),
                }
            }
            EventRoute::PublishAcknowledged { packet_id } => {
                let acknowledged = lock(&self.inner.publishes).acknowledge(*packet_id);
                match acknowledged {
                    Some(ack) => {
                        debug!(packet_id, message_id = %ack.message_id, "Publish acknowledged");
                        self.notify(|listener, client| {
                            listener.on_message_published(client, ack.message_id, ack.payload_size)
                        });
                    }
                    None => debug!(packet_id, "Acknowledgment for unknown packet id"),
                }
            }
            EventRoute::SubscriptionConfirmed { packet_id, rejected } => {
                if *rejected > 0 {
                    warn!(packet_id, rejected, "Broker refused some subscriptions");
                } else {
                    debug!(packet_id, "Subscription confirmed");
                }
            }
            EventRoute::BrokerDisconnected => {
                self.handle_connection_lost(ConnectionEvent::DisconnectedByBroker);
            }
            EventRoute::DisconnectSent => {
                self.handle_connection_lost(ConnectionEvent::DisconnectRequested);
            }
            EventRoute::InfrastructureEvent(event) => {
                trace!(target: "mqtt_transport", "MQTT event: {}", event);
            }
            EventRoute::OutgoingEvent => {}
        }

        route
    }

    async fn run_network_loop(self, event_loop: EventLoop) -> EventLoop {
        let span = crate::mqtt_span!(client_id = %self.inner.client_id);
        self.poll_until_shutdown(event_loop).instrument(span).await
    }

    async fn poll_until_shutdown(&self, mut event_loop: EventLoop) -> EventLoop {
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();
        let mut stopping = false;
        let mut reconnect_attempts = 0u32;

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed(), if !stopping => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        stopping = true;
                        // Keep polling while connected so the queued DISCONNECT is flushed
                        if !self.is_connected() {
                            break;
                        }
                    }
                }

                polled = event_loop.poll() => match polled {
                    Ok(event) => {
                        let route = self.dispatch_event(&event);
                        match route {
                            EventRoute::ConnectionAcknowledged { .. } => reconnect_attempts = 0,
                            EventRoute::DisconnectSent if stopping => break,
                            _ => {}
                        }
                    }
                    Err(error) => {
                        self.handle_connection_lost(ConnectionEvent::NetworkError(error.to_string()));
                        if stopping {
                            break;
                        }

                        let decision = HealthMonitor::should_attempt_reconnection(
                            reconnect_attempts,
                            &self.inner.reconnect_config,
                            *shutdown_rx.borrow(),
                        );
                        match decision {
                            ReconnectionDecision::Proceed { attempt, delay_ms } => {
                                reconnect_attempts = attempt;
                                self.transition(ConnectionEvent::ReconnectionStarted(attempt));
                                info!(attempt, delay_ms, "Attempting reconnection");
                                if !Self::interruptible_sleep(shutdown_rx.clone(), delay_ms).await {
                                    break;
                                }
                            }
                            ReconnectionDecision::AbortShutdownRequested => break,
                        }
                    }
                }
            }
        }

        info!("MQTT network task stopped");
        event_loop
    }

    /// Returns true if the sleep completed, false if shutdown was requested
    async fn interruptible_sleep(mut shutdown_rx: watch::Receiver<bool>, delay_ms: u64) -> bool {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("Shutdown signal received during reconnection delay, stopping");
                    return false;
                }
                true
            }
            _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => true,
        }
    }

    /// Move to a disconnected state; `on_disconnected` fires only when
    /// leaving `Connected`.
    fn handle_connection_lost(&self, event: ConnectionEvent) {
        let was_connected = self.is_connected();
        self.transition(event);
        if was_connected {
            self.notify(|listener, client| listener.on_disconnected(client));
        }
    }

    fn transition(&self, event: ConnectionEvent) {
        let next = HealthMonitor::determine_next_state(event);
        let previous = self.inner.state_tx.send_replace(next.clone());
        if previous != next {
            HealthMonitor::log_state_transition(&previous, &next);
        }
    }

    /// Never called with a bookkeeping lock held: listeners may re-enter
    /// `publish` or `subscribe`.
    fn notify<F>(&self, callback: F)
    where
        F: FnOnce(&dyn IotEventListener, &IotClient),
    {
        let listener = self
            .inner
            .listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(listener) = listener {
            callback(listener.as_ref(), self);
        }
    }
}

impl Transport for IotClient {
    type Error = MqttError;

    fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<MessageId, Self::Error> {
        IotClient::publish(self, topic, payload, qos)
    }

    fn subscribe(&self, subscriptions: Vec<Subscription>) -> Result<(), Self::Error> {
        IotClient::subscribe(self, subscriptions)
    }

    fn is_connected(&self) -> bool {
        IotClient::is_connected(self)
    }
}
