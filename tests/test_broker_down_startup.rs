//! Startup while the broker is down
//!
//! The agent must keep retrying in the background instead of failing:
//! `connect()` returns immediately, publishes fail with a transient error,
//! and `disconnect()` stops the retry loop promptly.


use freyr_agent::transport::mqtt::{ConnectionState, IotClient, MqttError, QoS};
use std::time::{Duration, Instant};
use test_helpers::unreachable_broker_config;

#[tokio::test]
async fn test_connect_returns_immediately_when_broker_unavailable() {
    let client = IotClient::new(&unreachable_broker_config("startup-retry-station"));

    let start = Instant::now();
    client.connect().unwrap();
    assert!(start.elapsed() < Duration::from_millis(100));

    let waited = client.wait_until_connected(Duration::from_millis(1500)).await;
    assert!(matches!(waited, Err(MqttError::NotConnected { .. })));
    assert!(!client.is_connected());
    assert_ne!(client.connection_state(), ConnectionState::Connected);

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_client_enters_reconnecting_state() {
    let client = IotClient::new(&unreachable_broker_config("reconnect-state-station"));
    client.connect().unwrap();

    let deadline = Instant::now() + Duration::from_secs(3);
    let mut saw_retry = false;
    while Instant::now() < deadline {
        if matches!(
            client.connection_state(),
            ConnectionState::Reconnecting(_) | ConnectionState::Disconnected(_)
        ) {
            saw_retry = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(saw_retry, "state stuck at {:?}", client.connection_state());

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_publish_is_transient_failure_while_down() {
    let client = IotClient::new(&unreachable_broker_config("publish-while-down"));
    client.connect().unwrap();

    let err = client
        .publish("sensors/freyr", b"{}".to_vec(), QoS::AtLeastOnce)
        .unwrap_err();
    assert!(err.is_transient());
    assert_eq!(client.pending_publishes(), 0);

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_disconnect_interrupts_retry_and_allows_restart() {
    let client = IotClient::new(&unreachable_broker_config("restart-station"));
    client.connect().unwrap();
    assert!(matches!(client.connect(), Err(MqttError::AlreadyStarted)));
    tokio::time::sleep(Duration::from_millis(300)).await;

    let start = Instant::now();
    client.disconnect().await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(client.connection_state(), ConnectionState::Idle);

    // Event loop was handed back, so the client can start again
    client.connect().unwrap();
    client.disconnect().await.unwrap();
}
