//! Synthetic sensor for running the station without hardware
//!
//! Values drift slowly around typical indoor conditions so dashboards show
//! something plausible. The sequence is deterministic.

use super::{EnvironmentSensor, SensorError, SensorReading};
use async_trait::async_trait;

#[derive(Debug, Default)]
pub struct SimulatedSensor {
    tick: u64,
}

impl SimulatedSensor {
    pub fn new() -> Self {
        Self::default()
    }

    fn reading_at(tick: u64) -> SensorReading {
        let phase = tick as f64 / 12.0;
        SensorReading {
            temperature: 21.0 + 1.5 * phase.sin(),
            pressure: 1013.25 + 2.0 * (phase / 3.0).cos(),
            humidity: 45.0 + 5.0 * (phase / 2.0).sin(),
        }
    }
}

#[async_trait]
impl EnvironmentSensor for SimulatedSensor {
    async fn read(&mut self) -> Result<SensorReading, SensorError> {
        let reading = Self::reading_at(self.tick);
        self.tick = self.tick.wrapping_add(1);
        Ok(reading)
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
