//! ---
//! rl_section: "02-hardware-simulation"
//! rl_subsection: "01-bootstrap"
//! rl_type: "source"
//! rl_scope: "code"
//! rl_description: "Simulated rack device exports and shared types."
//! rl_version: "v0.1.0"
//! rl_owner: "tbd"
//! ---
//! Simulated rack device for the RackLab harness.
//!
//! The simulator is a pure in-process model: no network or hardware I/O.
//! One instance is constructed per plan execution and exclusively owned by
//! it, which is what makes concurrent executions safe without locks.

pub mod device;
pub mod noise;
pub mod pacer;

pub use device::{DeviceState, HardwareSimulator, DEFAULT_FAN_SPEED, DEFAULT_TEMPERATURE_C};
pub use noise::{FixedNoise, SensorNoise, UniformNoise, SENSOR_JITTER_C};
pub use pacer::{InstantPacer, LoadPacer, WallClockPacer};
