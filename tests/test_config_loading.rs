//! Configuration loading and validation tests
//!
//! Tests focus on observable behavior: what loads, what defaults apply and
//! which files are rejected before the agent touches the network.


use freyr_agent::config::{AgentConfig, ConfigError, SensorKind};
use freyr_agent::transport::mqtt::{IotClient, QoS};
use test_helpers::{write_config, REQUIRED_KEYS};

#[test]
fn test_config_loads_from_toml_with_defaults() {
    let file = write_config(REQUIRED_KEYS, "toml");
    let config = AgentConfig::load_from_file(file.path()).unwrap();

    assert_eq!(config.endpoint, "localhost");
    assert_eq!(config.port, 1883);
    assert_eq!(config.client_id, "integration-station");
    assert_eq!(config.disconnect_timeout_s, 2);
    assert_eq!(config.operation_timeout_s, 1);

    assert_eq!(config.keep_alive_s, 120);
    assert_eq!(config.retry_interval_s, 5);
    assert_eq!(config.request_capacity, 10);
    assert!(config.subscriptions.is_empty());
    assert_eq!(config.sampling.topic, "sensors/freyr");
    assert_eq!(config.sampling.interval_s, 30);
    assert_eq!(config.sampling.qos, QoS::AtLeastOnce);
    assert_eq!(config.sensor.kind, SensorKind::Iio);
}

#[test]
fn test_config_loads_sections() {
    let content = format!(
        r#"{REQUIRED_KEYS}
subscriptions = [{{ topic = "commands/freyr", qos = 2 }}]

[sampling]
topic = "weather/garden"
interval_s = 60
qos = 0

[sensor]
kind = "simulated"
"#
    );
    let file = write_config(&content, "toml");
    let config = AgentConfig::load_from_file(file.path()).unwrap();

    assert_eq!(config.sampling.topic, "weather/garden");
    assert_eq!(config.sampling.interval_s, 60);
    assert_eq!(config.sampling.qos, QoS::AtMostOnce);
    assert_eq!(config.sensor.kind, SensorKind::Simulated);

    let subscriptions = config.subscription_list();
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0].topic_filter, "commands/freyr");
    assert_eq!(subscriptions[0].qos, QoS::ExactlyOnce);
}

#[test]
fn test_config_loads_from_json() {
    let content = r#"{
        "endpoint": "10.0.0.5",
        "port": 8883,
        "client_id": "json-station",
        "ca_path": "ca.pem",
        "certificate_path": "cert.pem",
        "private_key_path": "key.pem",
        "username": "u",
        "password": "p",
        "disconnect_timeout_s": 3,
        "operation_timeout_s": 4
    }"#;
    let file = write_config(content, "json");
    let config = AgentConfig::load_from_file(file.path()).unwrap();

    assert_eq!(config.endpoint, "10.0.0.5");
    assert_eq!(config.port, 8883);
    assert_eq!(config.client_id, "json-station");
}

#[test]
fn test_missing_port_fails_before_any_connection() {
    let content = REQUIRED_KEYS.replace("port = 1883\n", "");
    let file = write_config(&content, "toml");

    let result = AgentConfig::load_from_file(file.path());
    match result {
        Err(ConfigError::TomlParse(e)) => assert!(e.to_string().contains("port"), "{e}"),
        other => panic!("expected TOML parse error, got {other:?}"),
    }
    // No config means no client: nothing to connect with
}

#[test]
fn test_missing_file_is_read_error() {
    let result = AgentConfig::load_from_file(std::path::Path::new("/nonexistent/agent.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_malformed_json_is_parse_error() {
    let file = write_config("{ not json", "json");
    let result = AgentConfig::load_from_file(file.path());
    assert!(matches!(result, Err(ConfigError::JsonParse(_))));
}

#[test]
fn test_invalid_values_rejected() {
    let cases = [
        ("port = 1883", "port = 0"),
        ("endpoint = \"localhost\"", "endpoint = \"\""),
        ("client_id = \"integration-station\"", "client_id = \"\""),
    ];

    for (original, replacement) in cases {
        let content = REQUIRED_KEYS.replace(original, replacement);
        let file = write_config(&content, "toml");
        let result = AgentConfig::load_from_file(file.path());
        assert!(
            matches!(result, Err(ConfigError::InvalidConfig(_))),
            "{replacement} should be rejected, got {result:?}"
        );
    }
}

#[test]
fn test_zero_sampling_interval_rejected() {
    let content = format!("{REQUIRED_KEYS}\n[sampling]\ninterval_s = 0\n");
    let file = write_config(&content, "toml");
    assert!(matches!(
        AgentConfig::load_from_file(file.path()),
        Err(ConfigError::InvalidConfig(_))
    ));
}

#[test]
fn test_debug_output_redacts_password() {
    let file = write_config(REQUIRED_KEYS, "toml");
    let config = AgentConfig::load_from_file(file.path()).unwrap();
    let debug = format!("{config:?}");
    assert!(!debug.contains("s3cret"));
    assert!(debug.contains("***"));
}

#[tokio::test]
async fn test_loaded_config_builds_idle_client() {
    let file = write_config(REQUIRED_KEYS, "toml");
    let config = AgentConfig::load_from_file(file.path()).unwrap();
    let client = IotClient::new(&config);
    assert!(!client.is_connected());
    assert_eq!(client.client_id(), "integration-station");
}

#[test]
fn test_malformed_subscription_filters_block_startup() {
    let content = format!(
        r#"{REQUIRED_KEYS}
subscriptions = [{{ topic = "a/#/b" }}, {{ topic = "" }}]
"#
    );
    let file = write_config(&content, "toml");
    let result = AgentConfig::load_from_file(file.path());
    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
}

#[test]
fn test_zero_retry_interval_rejected() {
    let content = format!("{REQUIRED_KEYS}\nretry_interval_s = 0\n");
    let file = write_config(&content, "toml");
    assert!(matches!(
        AgentConfig::load_from_file(file.path()),
        Err(ConfigError::InvalidConfig(_))
    ));
}
