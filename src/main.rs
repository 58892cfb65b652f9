//! freyr-agent - environmental telemetry station entry point

use clap::{Parser, Subcommand};
use freyr_agent::agent::{SamplingLoop, SamplingSettings, StationListener};
use freyr_agent::config::{AgentConfig, ConfigError};
use freyr_agent::error::{AgentError, AgentResult};
use freyr_agent::observability::init_default_logging;
use freyr_agent::sensor::build_sensor;
use freyr_agent::transport::mqtt::IotClient;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{error, info, warn};

const DEFAULT_CONFIG_PATHS: &[&str] = &["agent.toml", "config/agent.toml"];

/// Environmental telemetry agent publishing sensor samples over MQTT
#[derive(Parser)]
#[command(name = "freyr-agent")]
#[command(version)]
struct Cli {
    /// Configuration file path (TOML, or JSON with a .json extension)
    #[arg(short, long, value_name = "FILE", env = "FREYR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample the sensor and publish until interrupted
    Run,
    /// Validate the configuration
    Config {
        /// Print the effective configuration with secrets redacted
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_default_logging() {
        eprintln!("Failed to initialize logging: {e}");
    }

    info!("Starting freyr-agent v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_agent(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!(error = %e, "Command failed");
        process::exit(1);
    }

    info!("Shutdown complete");
}

fn load_configuration(config_path: Option<&Path>) -> Result<AgentConfig, ConfigError> {
    if let Some(path) = config_path {
        return AgentConfig::load_from_file(path);
    }

    DEFAULT_CONFIG_PATHS
        .iter()
        .map(Path::new)
        .find(|path| path.exists())
        .map(AgentConfig::load_from_file)
        .unwrap_or_else(|| {
            Err(ConfigError::InvalidConfig(format!(
                "no configuration file found; pass -c/--config or create one of {}",
                DEFAULT_CONFIG_PATHS.join(", ")
            )))
        })
}

async fn run_agent(config: AgentConfig) -> AgentResult<()> {
    info!(
        client_id = %config.client_id,
        endpoint = %config.endpoint,
        port = config.port,
        "Agent starting"
    );

    let sensor = build_sensor(&config.sensor);
    info!(sensor = sensor.name(), "Sensor ready");

    let client = IotClient::new(&config);
    client.set_listener(Some(Arc::new(StationListener::new(
        config.subscription_list(),
    ))));
    client.connect()?;
    spawn_connection_report(client.clone(), Duration::from_secs(config.operation_timeout_s));

    let mut sigint = signal(SignalKind::interrupt()).map_err(AgentError::Signal)?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(AgentError::Signal)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sampler = SamplingLoop::new(
        sensor,
        Arc::new(client.clone()),
        SamplingSettings::from(&config.sampling),
    );
    let sampling = sampler.run(shutdown_rx);
    tokio::pin!(sampling);

    let finished = tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully");
            None
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully");
            None
        }
        result = &mut sampling => Some(result),
    };

    let sampling_result = match finished {
        Some(result) => result,
        None => {
            shutdown_tx.send_replace(true);
            sampling.await
        }
    };

    if let Err(e) = client.disconnect().await {
        warn!(error = %e, "Disconnect did not complete cleanly");
    }

    sampling_result
}

/// Report whether the first CONNACK arrives in time. Connection attempts
/// continue in the background either way.
fn spawn_connection_report(client: IotClient, timeout: Duration) {
    tokio::spawn(async move {
        match client.wait_until_connected(timeout).await {
            Ok(()) => info!("Broker connection established"),
            Err(e) => warn!(
                error = %e,
                timeout_s = timeout.as_secs(),
                "Broker not reachable yet, retrying in background"
            ),
        }
    });
}

fn handle_config_command(config: &AgentConfig, show: bool) -> AgentResult<()> {
    info!(client_id = %config.client_id, "Configuration is valid");

    if show {
        let mut shown = config.clone();
        shown.password = "***".to_string();
        let rendered = toml::to_string_pretty(&shown)
            .map_err(|e| ConfigError::InvalidConfig(format!("cannot render configuration: {e}")))?;
        println!("{rendered}");
    }

    Ok(())
}
