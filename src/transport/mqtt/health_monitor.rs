//! Pure connection health and reconnection logic for the MQTT client
//!
//! The network task asks this module what state follows an event and how
//! long to wait before the next reconnection attempt.

use super::connection::{ConnectionState, ReconnectConfig};
use tracing::{error, info, warn};

/// Pure health monitoring and reconnection decision logic
pub struct HealthMonitor;

impl HealthMonitor {
    /// Determine if reconnection should be attempted (pure function)
    pub fn should_attempt_reconnection(
        current_attempts: u32,
        config: &ReconnectConfig,
        shutdown_requested: bool,
    ) -> ReconnectionDecision {
        if shutdown_requested {
            return ReconnectionDecision::AbortShutdownRequested;
        }

        let attempt = current_attempts.saturating_add(1);
        ReconnectionDecision::Proceed {
            attempt,
            delay_ms: config.calculate_backoff_delay(attempt),
        }
    }

    /// Determine next state after connection event (pure function)
    pub fn determine_next_state(event: ConnectionEvent) -> ConnectionState {
        match event {
            ConnectionEvent::Started => ConnectionState::Connecting,
            ConnectionEvent::ConnAckReceived => ConnectionState::Connected,
            ConnectionEvent::DisconnectedByBroker => {
                ConnectionState::Disconnected("Broker disconnected".to_string())
            }
            ConnectionEvent::DisconnectRequested => {
                ConnectionState::Disconnected("Client disconnected".to_string())
            }
            ConnectionEvent::NetworkError(error) => ConnectionState::Disconnected(error),
            ConnectionEvent::ReconnectionStarted(attempt) => ConnectionState::Reconnecting(attempt),
            ConnectionEvent::Stopped => ConnectionState::Idle,
        }
    }

    /// Check if connection state allows publishing (pure function)
    pub fn can_publish(state: &ConnectionState) -> bool {
        matches!(state, ConnectionState::Connected)
    }

    /// Log connection state transition
    pub fn log_state_transition(from: &ConnectionState, to: &ConnectionState) {
        match (from, to) {
            (ConnectionState::Connecting, ConnectionState::Connected) => {
                info!("MQTT connection established");
            }
            (ConnectionState::Reconnecting(attempt), ConnectionState::Connected) => {
                info!(attempt, "MQTT reconnection successful");
            }
            (ConnectionState::Connected, ConnectionState::Disconnected(reason)) => {
                warn!(reason = %reason, "MQTT connection lost");
            }
            (_, ConnectionState::Disconnected(reason)) => {
                error!(reason = %reason, "MQTT connection attempt failed");
            }
            (_, ConnectionState::Reconnecting(_)) => {}
            _ => {
                info!("MQTT connection state: {:?} -> {:?}", from, to);
            }
        }
    }
}

/// Decision result for reconnection attempts
#[derive(Debug, PartialEq)]
pub enum ReconnectionDecision {
    /// Proceed with reconnection attempt
    Proceed { attempt: u32, delay_ms: u64 },
    /// Abort reconnection - shutdown requested
    AbortShutdownRequested,
}

/// Connection events that trigger state transitions
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Network task spawned
    Started,
    /// ConnAck received from broker
    ConnAckReceived,
    /// Broker initiated disconnect
    DisconnectedByBroker,
    /// Our DISCONNECT packet went out
    DisconnectRequested,
    /// Network or protocol error
    NetworkError(String),
    /// Waiting before the next attempt
    ReconnectionStarted(u32),
    /// Network task finished
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_attempt_reconnection() {
        let config = ReconnectConfig::default();

        let decision = HealthMonitor::should_attempt_reconnection(0, &config, false);
        assert_eq!(
            decision,
            ReconnectionDecision::Proceed {
                attempt: 1,
                delay_ms: 250
            }
        );

        let decision = HealthMonitor::should_attempt_reconnection(0, &config, true);
        assert_eq!(decision, ReconnectionDecision::AbortShutdownRequested);

        // Never gives up, sustains after the pattern
        let decision = HealthMonitor::should_attempt_reconnection(10_000, &config, false);
        assert_eq!(
            decision,
            ReconnectionDecision::Proceed {
                attempt: 10_001,
                delay_ms: 5000
            }
        );
    }

    #[test]
    fn test_attempt_counter_saturates() {
        let config = ReconnectConfig::default();
        let decision = HealthMonitor::should_attempt_reconnection(u32::MAX, &config, false);
        assert_eq!(
            decision,
            ReconnectionDecision::Proceed {
                attempt: u32::MAX,
                delay_ms: 5000
            }
        );
    }

    #[test]
    fn test_determine_next_state() {
        assert_eq!(
            HealthMonitor::determine_next_state(ConnectionEvent::Started),
            ConnectionState::Connecting
        );
        assert_eq!(
            HealthMonitor::determine_next_state(ConnectionEvent::ConnAckReceived),
            ConnectionState::Connected
        );
        assert_eq!(
            HealthMonitor::determine_next_state(ConnectionEvent::NetworkError(
                "connection refused".to_string()
            )),
            ConnectionState::Disconnected("connection refused".to_string())
        );
        assert_eq!(
            HealthMonitor::determine_next_state(ConnectionEvent::ReconnectionStarted(3)),
            ConnectionState::Reconnecting(3)
        );
        assert_eq!(
            HealthMonitor::determine_next_state(ConnectionEvent::Stopped),
            ConnectionState::Idle
        );
        assert!(matches!(
            HealthMonitor::determine_next_state(ConnectionEvent::DisconnectRequested),
            ConnectionState::Disconnected(_)
        ));
    }

    #[test]
    fn test_can_publish() {
        assert!(HealthMonitor::can_publish(&ConnectionState::Connected));
        assert!(!HealthMonitor::can_publish(&ConnectionState::Connecting));
        assert!(!HealthMonitor::can_publish(&ConnectionState::Idle));
        assert!(!HealthMonitor::can_publish(&ConnectionState::Reconnecting(1)));
        assert!(!HealthMonitor::can_publish(&ConnectionState::Disconnected(
            "gone".to_string()
        )));
    }
}
