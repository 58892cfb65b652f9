//! Sampling loop behavior against a mock transport


use freyr_agent::agent::{SampleOutcome, SamplingLoop, SamplingSettings};
use freyr_agent::error::AgentError;
use freyr_agent::telemetry::TelemetrySample;
use freyr_agent::testing::{MockTransport, ScriptedSensor};
use freyr_agent::transport::mqtt::QoS;
use std::sync::Arc;
use std::time::Duration;
use test_helpers::reading;
use tokio::sync::watch;

fn settings(interval: Duration) -> SamplingSettings {
    SamplingSettings {
        topic: "sensors/freyr".to_string(),
        interval,
        qos: QoS::AtLeastOnce,
        max_consecutive_failures: 3,
    }
}

#[tokio::test]
async fn test_published_payload_is_rounded_telemetry() {
    let transport = Arc::new(MockTransport::new());
    let sensor = ScriptedSensor::new(reading(21.456, 1013.251, 47.89));
    let mut sampler = SamplingLoop::new(sensor, transport.clone(), settings(Duration::from_secs(1)));

    sampler.sample_once().await.unwrap();

    let published = transport.published();
    let json: serde_json::Value = serde_json::from_slice(&published[0].payload).unwrap();
    assert_eq!(
        json["data"],
        serde_json::json!({"temperature": 21.5, "pressure": 1013.251, "humidity": 47.9})
    );
    assert!(json["timestamp"].as_i64().unwrap() > 1_600_000_000_000);
}

#[tokio::test]
async fn test_loop_runs_until_shutdown() {
    let transport = Arc::new(MockTransport::new());
    let sensor = ScriptedSensor::new(reading(20.0, 1000.0, 40.0));
    let sampler = SamplingLoop::new(sensor, transport.clone(), settings(Duration::from_millis(20)));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(sampler.run(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(150)).await;
    shutdown_tx.send(true).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("loop should stop promptly")
        .unwrap();
    assert!(result.is_ok());
    assert!(transport.published().len() >= 3);
}

#[tokio::test]
async fn test_shutdown_interrupts_long_interval() {
    let transport = Arc::new(MockTransport::new());
    let sensor = ScriptedSensor::new(reading(20.0, 1000.0, 40.0));
    let sampler = SamplingLoop::new(sensor, transport.clone(), settings(Duration::from_secs(3600)));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(sampler.run(shutdown_rx));
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown_tx.send(true).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
    assert!(result.is_ok(), "sleep between samples was not interrupted");
    assert_eq!(transport.published().len(), 1);
}

#[tokio::test]
async fn test_loop_survives_publish_failures() {
    let transport = Arc::new(MockTransport::disconnected());
    let sensor = ScriptedSensor::new(reading(20.0, 1000.0, 40.0));
    let mut sampler = SamplingLoop::new(sensor.clone(), transport.clone(), settings(Duration::ZERO));

    for _ in 0..3 {
        assert_eq!(
            sampler.sample_once().await.unwrap(),
            SampleOutcome::Dropped { transient: true }
        );
    }

    transport.set_connected(true);
    assert!(matches!(
        sampler.sample_once().await.unwrap(),
        SampleOutcome::Published(_)
    ));
    assert_eq!(transport.published().len(), 1);
    assert_eq!(sensor.reads(), 4);
}

#[tokio::test]
async fn test_loop_stops_after_consecutive_sensor_failures() {
    let transport = Arc::new(MockTransport::new());
    let sensor = ScriptedSensor::failing_first(10);
    let sampler = SamplingLoop::new(sensor.clone(), transport.clone(), settings(Duration::from_millis(5)));

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let result = tokio::time::timeout(Duration::from_secs(1), sampler.run(shutdown_rx))
        .await
        .expect("loop should give up on its own");

    assert!(matches!(result, Err(AgentError::Sensor(_))));
    assert_eq!(sensor.reads(), 3);
    assert!(transport.published().is_empty());
}

#[tokio::test]
async fn test_samples_deserialize() {
    let transport = Arc::new(MockTransport::new());
    let sensor = ScriptedSensor::new(reading(18.04, 990.0001, 60.05));
    let mut sampler = SamplingLoop::new(sensor, transport.clone(), settings(Duration::ZERO));
    sampler.sample_once().await.unwrap();

    let sample: TelemetrySample = serde_json::from_slice(&transport.published()[0].payload).unwrap();
    assert_eq!(sample.data.temperature, 18.0);
    assert_eq!(sample.data.pressure, 990.0);
}
