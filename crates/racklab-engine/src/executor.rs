//! ---
//! rl_section: "03-plan-execution"
//! rl_subsection: "module"
//! rl_type: "source"
//! rl_scope: "code"
//! rl_description: "Step dispatch and result collection over a device simulator."
//! rl_version: "v0.1.0"
//! rl_owner: "tbd"
//! ---
use std::path::Path;
use std::time::Duration;

use racklab_common::time::unix_seconds;
use racklab_sim::{
    HardwareSimulator, InstantPacer, LoadPacer, SensorNoise, UniformNoise, WallClockPacer,
};
use tracing::{debug, info};

use crate::plan::{ActionKind, PlanError, Step, TestPlan};
use crate::report::{CheckStatus, Report, StepOutcome, StepResult};

const DEFAULT_SEED: u64 = 0x7E57_1ABu64;

/// How an execution builds its simulator: jitter seed and optional demo
/// pacing. Pacing inserts a real sleep per modeled load second; it never
/// changes results.
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    pub seed: u64,
    pub tick_pause: Option<Duration>,
}

impl ExecutionOptions {
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed,
            tick_pause: None,
        }
    }

    pub fn with_pacing(mut self, tick_pause: Duration) -> Self {
        self.tick_pause = Some(tick_pause);
        self
    }

    fn build_simulator(&self) -> HardwareSimulator {
        let noise: Box<dyn SensorNoise + Send> = Box::new(UniformNoise::seeded(self.seed));
        let pacer: Box<dyn LoadPacer + Send> = match self.tick_pause {
            Some(pause) => Box::new(WallClockPacer::new(pause)),
            None => Box::new(InstantPacer),
        };
        HardwareSimulator::new(noise, pacer)
    }
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self::seeded(DEFAULT_SEED)
    }
}

/// Parse and execute a plan document. A fresh simulator is constructed for
/// this execution alone; structural plan errors propagate before any step
/// runs, so no partial report is ever produced.
pub fn execute_plan_source(source: &str, options: &ExecutionOptions) -> Result<Report, PlanError> {
    let plan = TestPlan::from_source(source)?;
    Ok(execute_plan(&plan, &mut options.build_simulator()))
}

/// Load a plan file from disk and execute it. See [`execute_plan_source`].
pub fn execute_plan_file(path: &Path, options: &ExecutionOptions) -> Result<Report, PlanError> {
    let plan = TestPlan::from_path(path)?;
    Ok(execute_plan(&plan, &mut options.build_simulator()))
}

/// Run every step of the plan, in order, against the given simulator.
///
/// Dispatch is fail-open: unknown actions and missing parameters are
/// recorded as error outcomes for their step and execution continues. A
/// failed assertion is ordinary data. The report always carries exactly one
/// entry per plan step.
pub fn execute_plan(plan: &TestPlan, simulator: &mut HardwareSimulator) -> Report {
    info!(steps = plan.len(), "executing test plan");
    let mut report = Report::default();
    for step in plan.steps() {
        let outcome = dispatch_step(simulator, step);
        debug!(step_id = %step.id, action = %step.action.name(), ?outcome, "step finished");
        report.push(StepResult {
            step_id: step.id.clone(),
            outcome,
            timestamp: unix_seconds(),
        });
    }
    info!(
        steps = report.len(),
        failures = report.has_failures(),
        "test plan finished"
    );
    report
}

fn dispatch_step(simulator: &mut HardwareSimulator, step: &Step) -> StepOutcome {
    match &step.action {
        ActionKind::SetFanSpeed => match step.params.value {
            Some(value) => StepOutcome::FanSpeed {
                fan_speed: simulator.set_fan_speed(value),
            },
            None => missing_parameter(step, "value"),
        },
        ActionKind::ApplyLoad => match (step.params.watts, step.params.duration_sec) {
            (Some(watts), Some(duration_sec)) => StepOutcome::Temperature {
                temperature: simulator.apply_load(watts, duration_sec),
            },
            (None, _) => missing_parameter(step, "watts"),
            (_, None) => missing_parameter(step, "duration_sec"),
        },
        ActionKind::ReadTemperature => match step.params.expect_max_c {
            Some(limit) => {
                let temperature = simulator.read_temperature();
                let status = if temperature <= limit {
                    CheckStatus::Pass
                } else {
                    CheckStatus::Fail
                };
                StepOutcome::Measurement {
                    temperature,
                    status,
                }
            }
            None => missing_parameter(step, "expect_max_c"),
        },
        // the simulator stays untouched for actions outside the known set
        ActionKind::Unrecognized(_) => StepOutcome::error("Unknown action"),
    }
}

fn missing_parameter(step: &Step, parameter: &str) -> StepOutcome {
    StepOutcome::error(format!(
        "missing parameter `{parameter}` for {}",
        step.action.name()
    ))
}
