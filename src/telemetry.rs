//! Telemetry payload published by the sampling loop
//!
//! ```json
//! {"timestamp": 1700000000000, "data": {"temperature": 21.5, "pressure": 1013.251, "humidity": 47.9}}
//! ```

use crate::sensor::SensorReading;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const TEMPERATURE_DECIMALS: i32 = 1;
const PRESSURE_DECIMALS: i32 = 3;
const HUMIDITY_DECIMALS: i32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub data: SampleData,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleData {
    pub temperature: f64,
    pub pressure: f64,
    pub humidity: f64,
}

impl TelemetrySample {
    /// Build a sample taken at `taken_at`, rounding each value for display
    pub fn from_reading(reading: &SensorReading, taken_at: DateTime<Utc>) -> Self {
        Self {
            timestamp: taken_at.timestamp_millis(),
            data: SampleData {
                temperature: round_to(reading.temperature, TEMPERATURE_DECIMALS),
                pressure: round_to(reading.pressure, PRESSURE_DECIMALS),
                humidity: round_to(reading.humidity, HUMIDITY_DECIMALS),
            },
        }
    }

    pub fn now(reading: &SensorReading) -> Self {
        Self::from_reading(reading, Utc::now())
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
