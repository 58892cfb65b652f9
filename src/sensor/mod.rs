//! Environmental sensor abstraction
//!
//! A sensor yields one combined temperature/pressure/humidity reading per
//! call. The station ships an IIO sysfs backend for BME280-class parts and a
//! simulated backend for development machines.

pub mod iio;
pub mod simulated;

use crate::config::{SensorKind, SensorSection};
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

pub use iio::IioSensor;
pub use simulated::SimulatedSensor;

/// One reading in display units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    /// Degrees Celsius
    pub temperature: f64,
    /// Hectopascals
    pub pressure: f64,
    /// Percent relative humidity
    pub humidity: f64,
}

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid value {value:?} in {path}")]
    Parse { path: PathBuf, value: String },

    #[error("Sensor unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait EnvironmentSensor: Send {
    /// Take one reading
    async fn read(&mut self) -> Result<SensorReading, SensorError>;

    /// Short label used in logs
    fn name(&self) -> &str;
}

#[async_trait]
impl<S: EnvironmentSensor + ?Sized> EnvironmentSensor for Box<S> {
    async fn read(&mut self) -> Result<SensorReading, SensorError> {
        (**self).read().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Build the sensor selected in the configuration
pub fn build_sensor(section: &SensorSection) -> Box<dyn EnvironmentSensor> {
    match section.kind {
        SensorKind::Iio => Box::new(IioSensor::new(&section.device)),
        SensorKind::Simulated => Box::new(SimulatedSensor::new()),
    }
}
