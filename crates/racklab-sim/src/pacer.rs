//! ---
//! rl_section: "02-hardware-simulation"
//! rl_subsection: "module"
//! rl_type: "source"
//! rl_scope: "code"
//! rl_description: "Load pacing strategies for the rack device simulator."
//! rl_version: "v0.1.0"
//! rl_owner: "tbd"
//! ---
use std::thread;
use std::time::Duration;

/// Pacing applied after each modeled one-second load tick.
///
/// The thermal model itself is instantaneous; pacing only slows a demo down
/// to something watchable. The pause length is fixed per tick and does not
/// scale with the requested duration.
pub trait LoadPacer {
    fn pause(&self);
}

/// No pacing: `apply_load` completes immediately. The default everywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantPacer;

impl LoadPacer for InstantPacer {
    fn pause(&self) {}
}

/// Real sleeping between ticks for wall-clock-paced demos.
#[derive(Debug, Clone, Copy)]
pub struct WallClockPacer {
    pause: Duration,
}

impl WallClockPacer {
    pub fn new(pause: Duration) -> Self {
        Self { pause }
    }
}

impl Default for WallClockPacer {
    fn default() -> Self {
        Self::new(Duration::from_millis(200))
    }
}

impl LoadPacer for WallClockPacer {
    fn pause(&self) {
        thread::sleep(self.pause);
    }
}
