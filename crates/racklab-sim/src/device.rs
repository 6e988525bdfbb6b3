//! ---
//! rl_section: "02-hardware-simulation"
//! rl_subsection: "module"
//! rl_type: "source"
//! rl_scope: "code"
//! rl_description: "Mutable rack device state and its operations."
//! rl_version: "v0.1.0"
//! rl_owner: "tbd"
//! ---
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::noise::{SensorNoise, UniformNoise};
use crate::pacer::{InstantPacer, LoadPacer};

pub const DEFAULT_FAN_SPEED: i64 = 50;
pub const DEFAULT_TEMPERATURE_C: f64 = 35.0;

/// Watts of sustained load that raise the device by one degree per second.
const HEATING_DIVISOR_W: f64 = 300.0;

/// Mutable device state owned by one plan execution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeviceState {
    pub fan_speed: i64,
    pub temperature_c: f64,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            fan_speed: DEFAULT_FAN_SPEED,
            temperature_c: DEFAULT_TEMPERATURE_C,
        }
    }
}

/// Simulated rack device: fan control, thermal load, temperature sensing.
///
/// Construct one per plan execution and drop it when the execution ends.
/// Sharing an instance across concurrent executions is unsupported by
/// design; the executor owns its simulator exclusively.
pub struct HardwareSimulator {
    state: DeviceState,
    noise: Box<dyn SensorNoise + Send>,
    pacer: Box<dyn LoadPacer + Send>,
}

impl HardwareSimulator {
    pub fn new(noise: Box<dyn SensorNoise + Send>, pacer: Box<dyn LoadPacer + Send>) -> Self {
        Self {
            state: DeviceState::default(),
            noise,
            pacer,
        }
    }

    /// Unpaced simulator with uniform sensor jitter from the given seed.
    pub fn seeded(seed: u64) -> Self {
        Self::new(Box::new(UniformNoise::seeded(seed)), Box::new(InstantPacer))
    }

    /// Current device state snapshot.
    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Overwrite the fan speed unconditionally and return the new value.
    ///
    /// Known limitation: no range validation. Out-of-range values are
    /// accepted as-is.
    pub fn set_fan_speed(&mut self, value: i64) -> i64 {
        self.state.fan_speed = value;
        debug!(fan_speed = value, "fan speed set");
        self.state.fan_speed
    }

    /// Apply a thermal load and return the resulting temperature.
    ///
    /// Linear heating model: the device gains `watts / 300` degrees for each
    /// of `duration_sec` modeled one-second ticks. Non-positive durations
    /// produce zero ticks. The pacer runs once per tick; it never feeds back
    /// into the thermal formula.
    pub fn apply_load(&mut self, watts: i64, duration_sec: i64) -> f64 {
        for _ in 0..duration_sec.max(0) {
            self.state.temperature_c += watts as f64 / HEATING_DIVISOR_W;
            self.pacer.pause();
        }
        debug!(
            watts,
            duration_sec,
            temperature_c = self.state.temperature_c,
            "load applied"
        );
        round2(self.state.temperature_c)
    }

    /// Read the temperature sensor: true temperature plus one jitter sample.
    ///
    /// The sample is not persisted; the true temperature is unaffected by
    /// reads.
    pub fn read_temperature(&mut self) -> f64 {
        round2(self.state.temperature_c + self.noise.sample())
    }
}

impl fmt::Debug for HardwareSimulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HardwareSimulator")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Sensor readings are reported at two-decimal precision.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
