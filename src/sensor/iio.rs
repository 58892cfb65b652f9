//! Linux Industrial I/O sysfs backend
//!
//! Reads the channels the kernel `bme280` driver exposes under
//! `/sys/bus/iio/devices/iio:deviceN`. Each channel is read as
//! `(raw + offset) * scale` when a `_raw` attribute exists, otherwise from
//! the processed `_input` attribute. IIO reports temperature in milli-degrees
//! Celsius, pressure in kilopascals and humidity in milli-percent.

use super::{EnvironmentSensor, SensorError, SensorReading};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::trace;

struct Channel {
    prefix: &'static str,
    /// Multiplier from IIO units to display units
    to_display: f64,
}

const TEMPERATURE: Channel = Channel {
    prefix: "in_temp",
    to_display: 0.001,
};

const PRESSURE: Channel = Channel {
    prefix: "in_pressure",
    to_display: 10.0,
};

const HUMIDITY: Channel = Channel {
    prefix: "in_humidityrelative",
    to_display: 0.001,
};

pub struct IioSensor {
    device: PathBuf,
}

impl IioSensor {
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
        }
    }

    pub fn device(&self) -> &Path {
        &self.device
    }

    async fn read_channel(&self, channel: &Channel) -> Result<f64, SensorError> {
        let raw_path = self.device.join(format!("{}_raw", channel.prefix));
        let value = match read_attribute(&raw_path).await {
            Ok(raw) => {
                let scale = self
                    .read_optional(&format!("{}_scale", channel.prefix))
                    .await?
                    .unwrap_or(1.0);
                let offset = self
                    .read_optional(&format!("{}_offset", channel.prefix))
                    .await?
                    .unwrap_or(0.0);
                (raw + offset) * scale
            }
            Err(SensorError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                let input_path = self.device.join(format!("{}_input", channel.prefix));
                read_attribute(&input_path).await?
            }
            Err(e) => return Err(e),
        };

        trace!(channel = channel.prefix, value, "IIO channel read");
        Ok(value * channel.to_display)
    }

    async fn read_optional(&self, attribute: &str) -> Result<Option<f64>, SensorError> {
        match read_attribute(&self.device.join(attribute)).await {
            Ok(value) => Ok(Some(value)),
            Err(SensorError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

async fn read_attribute(path: &Path) -> Result<f64, SensorError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SensorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    parse_attribute(path, &content)
}

fn parse_attribute(path: &Path, content: &str) -> Result<f64, SensorError> {
    let trimmed = content.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(SensorError::Parse {
            path: path.to_path_buf(),
            value: trimmed.to_string(),
        }),
    }
}

#[async_trait]
impl EnvironmentSensor for IioSensor {
    async fn read(&mut self) -> Result<SensorReading, SensorError> {
        Ok(SensorReading {
            temperature: self.read_channel(&TEMPERATURE).await?,
            pressure: self.read_channel(&PRESSURE).await?,
            humidity: self.read_channel(&HUMIDITY).await?,
        })
    }

    fn name(&self) -> &str {
        "iio"
    }
}
