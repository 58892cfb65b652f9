//! Periodic sensor sampling and telemetry publishing

use crate::config::SamplingSection;
use crate::error::{AgentError, AgentResult};
use crate::sensor::EnvironmentSensor;
use crate::telemetry::TelemetrySample;
use crate::transport::mqtt::{MessageId, QoS};
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn, Instrument};

/// Sampling parameters taken from the `[sampling]` config section
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingSettings {
    pub topic: String,
    pub interval: Duration,
    pub qos: QoS,
    /// Sensor failures in a row before the loop gives up
    pub max_consecutive_failures: u32,
}

impl From<&SamplingSection> for SamplingSettings {
    fn from(section: &SamplingSection) -> Self {
        Self {
            topic: section.topic.clone(),
            interval: Duration::from_secs(section.interval_s),
            qos: section.qos,
            max_consecutive_failures: section.max_consecutive_failures,
        }
    }
}

/// What happened on one tick
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    /// Sample queued for delivery
    Published(MessageId),
    /// Transport refused the sample; it was dropped
    Dropped { transient: bool },
    /// Sensor read failed; `consecutive` failures so far
    SensorFailed { consecutive: u32 },
}

pub struct SamplingLoop<S, T> {
    sensor: S,
    transport: Arc<T>,
    settings: SamplingSettings,
    consecutive_failures: u32,
    ticks: u64,
}

impl<S, T> SamplingLoop<S, T>
where
    S: EnvironmentSensor,
    T: Transport,
{
    pub fn new(sensor: S, transport: Arc<T>, settings: SamplingSettings) -> Self {
        Self {
            sensor,
            transport,
            settings,
            consecutive_failures: 0,
            ticks: 0,
        }
    }

    pub fn settings(&self) -> &SamplingSettings {
        &self.settings
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Run one tick: read, serialize, publish.
    ///
    /// Publish failures are logged and the sample dropped. Sensor failures
    /// are tolerated until `max_consecutive_failures` in a row, which
    /// returns [`AgentError::Sensor`].
    pub async fn sample_once(&mut self) -> AgentResult<SampleOutcome> {
        self.ticks += 1;
        let span = crate::sample_span!(tick = self.ticks, sensor = self.sensor.name());
        self.take_sample().instrument(span).await
    }

    async fn take_sample(&mut self) -> AgentResult<SampleOutcome> {
        let reading = match self.sensor.read().await {
            Ok(reading) => {
                self.consecutive_failures = 0;
                reading
            }
            Err(e) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.settings.max_consecutive_failures {
                    error!(
                        error = %e,
                        consecutive = self.consecutive_failures,
                        "Sensor failed too many times in a row, giving up"
                    );
                    return Err(AgentError::Sensor(e));
                }
                warn!(
                    error = %e,
                    consecutive = self.consecutive_failures,
                    "Sensor read failed, retrying next tick"
                );
                return Ok(SampleOutcome::SensorFailed {
                    consecutive: self.consecutive_failures,
                });
            }
        };

        let sample = TelemetrySample::now(&reading);
        let payload = sample.to_json()?;
        let payload_size = payload.len();

        match self
            .transport
            .publish(&self.settings.topic, payload, self.settings.qos)
        {
            Ok(message_id) => {
                debug!(
                    topic = %self.settings.topic,
                    %message_id,
                    payload_size,
                    temperature = sample.data.temperature,
                    pressure = sample.data.pressure,
                    humidity = sample.data.humidity,
                    "Sample published"
                );
                Ok(SampleOutcome::Published(message_id))
            }
            Err(e) => {
                let transient = is_transient(&e);
                warn!(error = %e, transient, "Publish failed, dropping sample");
                Ok(SampleOutcome::Dropped { transient })
            }
        }
    }

    /// Sample until `shutdown` turns true. Only sensor exhaustion and
    /// serialization failures end the loop early.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> AgentResult<()> {
        info!(
            topic = %self.settings.topic,
            interval_s = self.settings.interval.as_secs(),
            qos = %self.settings.qos,
            sensor = self.sensor.name(),
            "Sampling loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.sample_once().await?;

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }

        info!(samples = self.ticks, "Sampling loop stopped");
        Ok(())
    }
}

fn is_transient(error: &(dyn std::error::Error + 'static)) -> bool {
    error
        .downcast_ref::<crate::transport::mqtt::MqttError>()
        .is_some_and(|e| e.is_transient())
}
